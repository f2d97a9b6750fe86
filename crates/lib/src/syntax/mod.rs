//! Script compilation.
//!
//! Compilation runs three passes and stops after the first pass that reports
//! errors:
//!
//! 1. **Lex**: source text to tokens ([`lexer`])
//! 2. **Parse**: tokens to an untyped syntax tree ([`parser`], [`ast`])
//! 3. **Bind**: name, kind and arity resolution against the static action
//!    registry ([`binder`], [`actions`]) producing a [`Script`]
//!
//! Errors of one pass are accumulated so the operator sees all of them at once.
//!
//! # Example
//!
//! ```
//! use deployer_lib::syntax::compile;
//!
//! let script = compile(r#"flash("img.wim", disk = @disk);"#).unwrap();
//! assert_eq!(script.statements().len(), 1);
//! ```

pub mod actions;
pub mod ast;
pub mod binder;
pub mod lexer;
pub mod parser;
pub mod script;

use std::fmt;
use std::ops::Range;

use thiserror::Error;
use tracing::debug;

pub use actions::{ActionKind, ActionSpec, ParamSpec};
pub use script::{BoundExpr, CompareOp, Invocation, Script, Statement, Value, ValueKind};

/// Byte range into the source text.
pub type Span = Range<usize>;

/// Human-facing source location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
  /// 1-based line.
  pub line: usize,
  /// 1-based column, counted in characters.
  pub column: usize,
  /// Byte offset into the source.
  pub offset: usize,
}

impl Position {
  /// Compute the line/column of a byte offset.
  ///
  /// Offsets past the end of the source clamp to the end.
  pub fn from_offset(source: &str, offset: usize) -> Self {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut column = 1;
    for (idx, ch) in source.char_indices() {
      if idx >= offset {
        break;
      }
      if ch == '\n' {
        line += 1;
        column = 1;
      } else {
        column += 1;
      }
    }
    Self { line, column, offset }
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

/// One compiler message anchored at a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub position: Position,
  pub message: String,
}

impl Diagnostic {
  pub fn new(position: Position, message: impl Into<String>) -> Self {
    Self {
      position,
      message: message.into(),
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.position, self.message)
  }
}

fn join(diagnostics: &[Diagnostic]) -> String {
  diagnostics
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// Errors that stop compilation, tagged by the pass that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilerError {
  /// The source contains characters or literals that do not form tokens.
  #[error("lex error: {}", join(.0))]
  Lex(Vec<Diagnostic>),

  /// The token stream does not match the grammar.
  #[error("parse error: {}", join(.0))]
  Parse(Vec<Diagnostic>),

  /// The syntax tree references unknown actions/variables or mismatches kinds.
  #[error("bind error: {}", join(.0))]
  Bind(Vec<Diagnostic>),
}

impl CompilerError {
  /// All diagnostics of the failing pass, in source order.
  pub fn diagnostics(&self) -> &[Diagnostic] {
    match self {
      CompilerError::Lex(d) | CompilerError::Parse(d) | CompilerError::Bind(d) => d,
    }
  }

  /// Diagnostics rendered one per line, for display next to the source.
  pub fn lines(&self) -> Vec<String> {
    let pass = match self {
      CompilerError::Lex(_) => "lex",
      CompilerError::Parse(_) => "parse",
      CompilerError::Bind(_) => "bind",
    };
    self
      .diagnostics()
      .iter()
      .map(|d| format!("{} error at {}", pass, d))
      .collect()
  }
}

/// Compile source text into a bound [`Script`].
///
/// Pure: the result depends only on `source` and the static action registry.
pub fn compile(source: &str) -> Result<Script, CompilerError> {
  let tokens = lexer::lex(source).map_err(CompilerError::Lex)?;
  debug!(tokens = tokens.len(), "lexed script");

  let tree = parser::parse(source, &tokens).map_err(CompilerError::Parse)?;
  debug!(statements = tree.statements.len(), "parsed script");

  let script = binder::bind(source, &tree).map_err(CompilerError::Bind)?;
  debug!(statements = script.statements().len(), "bound script");

  Ok(script)
}
