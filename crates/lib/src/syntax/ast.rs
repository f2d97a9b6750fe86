//! Untyped syntax tree produced by the parser.
//!
//! Nothing here is resolved yet: identifiers are plain names and externals
//! carry their raw annotation.

use super::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
  pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
  pub name: String,
  pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Let {
    name: Ident,
    value: Expr,
  },
  Call(Call),
  If {
    condition: Expr,
    then_block: Block,
    else_block: Option<Block>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
  pub statements: Vec<Stmt>,
  pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub name: Ident,
  pub args: Vec<Arg>,
  pub span: Span,
}

/// Call argument; `name` is set for `name = value` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
  pub name: Option<Ident>,
  pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Text(String, Span),
  Number(i64, Span),
  Bool(bool, Span),
  Variable(Ident),
  /// `@key` or `@key:annotation`
  External {
    key: Ident,
    annotation: Option<Ident>,
    span: Span,
  },
  Not(Box<Expr>, Span),
  Compare {
    op: CompareOp,
    left: Box<Expr>,
    right: Box<Expr>,
    span: Span,
  },
}

impl Expr {
  pub fn span(&self) -> Span {
    match self {
      Expr::Text(_, span) | Expr::Number(_, span) | Expr::Bool(_, span) => span.clone(),
      Expr::Variable(ident) => ident.span.clone(),
      Expr::External { span, .. } | Expr::Not(_, span) | Expr::Compare { span, .. } => span.clone(),
    }
  }

  /// Literal values may be coerced by the binder; computed values may not.
  pub fn is_literal(&self) -> bool {
    matches!(self, Expr::Text(..) | Expr::Number(..) | Expr::Bool(..))
  }
}
