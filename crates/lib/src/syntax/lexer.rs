//! Tokenization of deployment scripts using logos.
//!
//! Whitespace and comments (`// ...` and `# ...`) are skipped. Every token is
//! paired with its byte span so later passes can report positions.

use std::fmt;

use logos::Logos;

use super::{Diagnostic, Position, Span};

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
  #[regex(r"//[^\n]*", logos::skip, allow_greedy = true)]
  #[regex(r"#[^\n]*", logos::skip, allow_greedy = true)]
  Comment,

  #[token("let")]
  Let,
  #[token("if")]
  If,
  #[token("else")]
  Else,
  #[token("true")]
  True,
  #[token("false")]
  False,

  #[token("(")]
  LParen,
  #[token(")")]
  RParen,
  #[token("{")]
  LBrace,
  #[token("}")]
  RBrace,
  #[token(",")]
  Comma,
  #[token(";")]
  Semicolon,
  #[token(":")]
  Colon,
  #[token("@")]
  At,
  #[token("==")]
  EqEq,
  #[token("!=")]
  NotEq,
  #[token("=")]
  Assign,
  #[token("!")]
  Bang,

  /// Unsigned integer literal. Overflowing literals fail to lex.
  #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
  Number(i64),

  /// String literal with escapes already resolved.
  #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
  Str(String),

  #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
  Ident(String),
}

/// Resolve the escapes of a quoted literal. Unknown escapes reject the token.
fn unescape(quoted: &str) -> Option<String> {
  let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
  let mut out = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(ch) = chars.next() {
    if ch != '\\' {
      out.push(ch);
      continue;
    }
    match chars.next()? {
      '"' => out.push('"'),
      '\\' => out.push('\\'),
      'n' => out.push('\n'),
      't' => out.push('\t'),
      _ => return None,
    }
  }
  Some(out)
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Comment => write!(f, "comment"),
      Token::Let => write!(f, "'let'"),
      Token::If => write!(f, "'if'"),
      Token::Else => write!(f, "'else'"),
      Token::True => write!(f, "'true'"),
      Token::False => write!(f, "'false'"),
      Token::LParen => write!(f, "'('"),
      Token::RParen => write!(f, "')'"),
      Token::LBrace => write!(f, "'{{'"),
      Token::RBrace => write!(f, "'}}'"),
      Token::Comma => write!(f, "','"),
      Token::Semicolon => write!(f, "';'"),
      Token::Colon => write!(f, "':'"),
      Token::At => write!(f, "'@'"),
      Token::EqEq => write!(f, "'=='"),
      Token::NotEq => write!(f, "'!='"),
      Token::Assign => write!(f, "'='"),
      Token::Bang => write!(f, "'!'"),
      Token::Number(n) => write!(f, "number {}", n),
      Token::Str(s) => write!(f, "string {:?}", s),
      Token::Ident(name) => write!(f, "identifier '{}'", name),
    }
  }
}

/// Tokenize `source`, collecting every invalid slice as a diagnostic.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, Vec<Diagnostic>> {
  let mut tokens = Vec::new();
  let mut errors = Vec::new();

  for (result, span) in Token::lexer(source).spanned() {
    match result {
      Ok(token) => tokens.push((token, span)),
      Err(()) => {
        let slice = &source[span.clone()];
        let message = if slice.starts_with('"') {
          "invalid string literal".to_string()
        } else if slice.starts_with(|c: char| c.is_ascii_digit()) {
          format!("number literal '{}' is out of range", slice)
        } else {
          format!("unexpected character '{}'", slice)
        };
        errors.push(Diagnostic::new(Position::from_offset(source, span.start), message));
      }
    }
  }

  if errors.is_empty() { Ok(tokens) } else { Err(errors) }
}
