//! Hand-written recursive descent parser.
//!
//! Grammar:
//!
//! ```text
//! script    := stmt*
//! stmt      := "let" IDENT "=" expr end
//!            | "if" expr block ("else" (block | if-stmt))?
//!            | IDENT "(" args? ")" end
//!            | ";"
//! end       := ";" | <before "}"> | <end of input>
//! args      := arg ("," arg)* ","?
//! arg       := IDENT "=" expr | expr
//! expr      := unary (("==" | "!=") unary)?
//! unary     := "!" unary | primary
//! primary   := STRING | NUMBER | "true" | "false" | IDENT
//!            | "@" IDENT (":" IDENT)? | "(" expr ")"
//! ```
//!
//! A statement that fails to parse is reported and skipped up to the next
//! statement boundary, so one pass reports every syntax error.
//! Nesting deeper than [`MAX_DEPTH`] is reported once and ends the parse.

use super::ast::{Arg, Block, Call, CompareOp, Expr, Ident, Stmt, SyntaxTree};
use super::lexer::Token;
use super::{Diagnostic, Position, Span};

#[derive(Debug, Clone, PartialEq)]
struct ParseError {
  message: String,
  span: Span,
}

impl ParseError {
  fn new(message: impl Into<String>, span: Span) -> Self {
    Self {
      message: message.into(),
      span,
    }
  }
}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting of blocks, `else if` chains, parentheses and `!`.
const MAX_DEPTH: usize = 128;

/// Token cursor with lookahead and span tracking.
struct TokenStream<'src> {
  tokens: &'src [(Token, Span)],
  pos: usize,
  end_of_input: usize,
}

impl<'src> TokenStream<'src> {
  fn new(tokens: &'src [(Token, Span)], end_of_input: usize) -> Self {
    Self {
      tokens,
      pos: 0,
      end_of_input,
    }
  }

  fn peek(&self) -> Option<&'src Token> {
    self.tokens.get(self.pos).map(|(tok, _)| tok)
  }

  fn peek_nth(&self, n: usize) -> Option<&'src Token> {
    self.tokens.get(self.pos + n).map(|(tok, _)| tok)
  }

  fn advance(&mut self) -> Option<&'src Token> {
    let token = self.peek();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn check(&self, expected: &Token) -> bool {
    matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
  }

  fn current_span(&self) -> Span {
    match self.tokens.get(self.pos) {
      Some((_, span)) => span.clone(),
      None => self.end_of_input..self.end_of_input,
    }
  }

  /// Span from the token at `start` through the last consumed token.
  fn span_from(&self, start: usize) -> Span {
    let start_byte = self
      .tokens
      .get(start)
      .map(|(_, span)| span.start)
      .unwrap_or(self.end_of_input);
    let end_byte = self
      .pos
      .checked_sub(1)
      .and_then(|last| self.tokens.get(last))
      .map(|(_, span)| span.end)
      .unwrap_or(start_byte);
    start_byte..end_byte.max(start_byte)
  }

  fn found(&self) -> String {
    match self.peek() {
      Some(token) => token.to_string(),
      None => "end of input".to_string(),
    }
  }

  fn expect(&mut self, expected: Token) -> ParseResult<Span> {
    if self.check(&expected) {
      let span = self.current_span();
      self.advance();
      Ok(span)
    } else {
      Err(ParseError::new(
        format!("expected {}, found {}", expected, self.found()),
        self.current_span(),
      ))
    }
  }

  fn expect_ident(&mut self, what: &str) -> ParseResult<Ident> {
    match self.peek() {
      Some(Token::Ident(name)) => {
        let span = self.current_span();
        self.advance();
        Ok(Ident {
          name: name.clone(),
          span,
        })
      }
      _ => Err(ParseError::new(
        format!("expected {}, found {}", what, self.found()),
        self.current_span(),
      )),
    }
  }

  /// Skip to the next statement boundary after an error.
  fn synchronize(&mut self) {
    while let Some(token) = self.peek() {
      match token {
        Token::Semicolon => {
          self.advance();
          break;
        }
        Token::RBrace | Token::Let | Token::If => break,
        _ => {
          self.advance();
        }
      }
    }
  }
}

struct Parser<'src> {
  stream: TokenStream<'src>,
  errors: Vec<ParseError>,
  depth: usize,
  too_deep: bool,
}

impl<'src> Parser<'src> {
  /// Run `parse` one nesting level deeper. Exceeding [`MAX_DEPTH`] reports a
  /// single error and abandons the rest of the input.
  fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
    if self.depth >= MAX_DEPTH {
      let err = ParseError::new(
        format!("nesting is deeper than {} levels", MAX_DEPTH),
        self.stream.current_span(),
      );
      self.errors.push(err.clone());
      self.too_deep = true;
      return Err(err);
    }
    self.depth += 1;
    let result = parse(self);
    self.depth -= 1;
    result
  }

  /// Parse statements until `}` (when `in_block`) or end of input.
  fn statements(&mut self, in_block: bool) -> Vec<Stmt> {
    let mut statements = Vec::new();
    loop {
      match self.stream.peek() {
        None => break,
        Some(Token::RBrace) if in_block => break,
        Some(Token::Semicolon) => {
          self.stream.advance();
          continue;
        }
        _ => {}
      }

      let before = self.stream.pos;
      match self.statement() {
        Ok(stmt) => statements.push(stmt),
        Err(_) if self.too_deep => break,
        Err(err) => {
          self.errors.push(err);
          self.stream.synchronize();
          if self.stream.pos == before {
            // stray '}' at top level, or a keyword that failed on itself
            self.stream.advance();
          }
        }
      }
    }
    statements
  }

  fn statement(&mut self) -> ParseResult<Stmt> {
    match self.stream.peek() {
      Some(Token::Let) => self.let_statement(),
      Some(Token::If) => self.if_statement(),
      Some(Token::Ident(_)) => {
        let call = self.call()?;
        self.end_of_statement()?;
        Ok(Stmt::Call(call))
      }
      _ => Err(ParseError::new(
        format!("expected statement, found {}", self.stream.found()),
        self.stream.current_span(),
      )),
    }
  }

  fn end_of_statement(&mut self) -> ParseResult<()> {
    match self.stream.peek() {
      Some(Token::Semicolon) => {
        self.stream.advance();
        Ok(())
      }
      None | Some(Token::RBrace) => Ok(()),
      Some(_) => Err(ParseError::new(
        format!("expected ';' after statement, found {}", self.stream.found()),
        self.stream.current_span(),
      )),
    }
  }

  fn let_statement(&mut self) -> ParseResult<Stmt> {
    self.stream.expect(Token::Let)?;
    let name = self.stream.expect_ident("variable name")?;
    self.stream.expect(Token::Assign)?;
    let value = self.expr()?;
    self.end_of_statement()?;
    Ok(Stmt::Let { name, value })
  }

  fn if_statement(&mut self) -> ParseResult<Stmt> {
    self.stream.expect(Token::If)?;
    let condition = self.expr()?;
    let then_block = self.block()?;

    let else_block = if self.stream.check(&Token::Else) {
      self.stream.advance();
      if self.stream.check(&Token::If) {
        let start = self.stream.pos;
        let nested = self.nested(Self::if_statement)?;
        Some(Block {
          statements: vec![nested],
          span: self.stream.span_from(start),
        })
      } else {
        Some(self.block()?)
      }
    } else {
      None
    };

    Ok(Stmt::If {
      condition,
      then_block,
      else_block,
    })
  }

  fn block(&mut self) -> ParseResult<Block> {
    let start = self.stream.pos;
    self.stream.expect(Token::LBrace)?;
    let statements = self.nested(|parser| Ok(parser.statements(true)))?;
    self.stream.expect(Token::RBrace)?;
    Ok(Block {
      statements,
      span: self.stream.span_from(start),
    })
  }

  fn call(&mut self) -> ParseResult<Call> {
    let start = self.stream.pos;
    let name = self.stream.expect_ident("action name")?;
    if !self.stream.check(&Token::LParen) {
      let message = if self.stream.check(&Token::Assign) {
        format!("assignment to '{}' requires 'let'", name.name)
      } else {
        format!("expected '(' after '{}', found {}", name.name, self.stream.found())
      };
      return Err(ParseError::new(message, self.stream.current_span()));
    }
    self.stream.advance();

    let mut args = Vec::new();
    while !self.stream.check(&Token::RParen) {
      args.push(self.arg()?);
      if self.stream.check(&Token::Comma) {
        self.stream.advance();
      } else {
        break;
      }
    }
    self.stream.expect(Token::RParen)?;

    Ok(Call {
      name,
      args,
      span: self.stream.span_from(start),
    })
  }

  fn arg(&mut self) -> ParseResult<Arg> {
    if matches!(self.stream.peek(), Some(Token::Ident(_))) && matches!(self.stream.peek_nth(1), Some(Token::Assign)) {
      let name = self.stream.expect_ident("argument name")?;
      self.stream.expect(Token::Assign)?;
      let value = self.expr()?;
      return Ok(Arg { name: Some(name), value });
    }
    Ok(Arg {
      name: None,
      value: self.expr()?,
    })
  }

  fn expr(&mut self) -> ParseResult<Expr> {
    let start = self.stream.pos;
    let left = self.unary()?;

    let op = match self.stream.peek() {
      Some(Token::EqEq) => CompareOp::Eq,
      Some(Token::NotEq) => CompareOp::NotEq,
      _ => return Ok(left),
    };
    self.stream.advance();
    let right = self.unary()?;

    if matches!(self.stream.peek(), Some(Token::EqEq | Token::NotEq)) {
      return Err(ParseError::new(
        "comparison operators cannot be chained; use parentheses",
        self.stream.current_span(),
      ));
    }

    Ok(Expr::Compare {
      op,
      left: Box::new(left),
      right: Box::new(right),
      span: self.stream.span_from(start),
    })
  }

  fn unary(&mut self) -> ParseResult<Expr> {
    if self.stream.check(&Token::Bang) {
      let start = self.stream.pos;
      self.stream.advance();
      let inner = self.nested(Self::unary)?;
      return Ok(Expr::Not(Box::new(inner), self.stream.span_from(start)));
    }
    self.primary()
  }

  fn primary(&mut self) -> ParseResult<Expr> {
    let span = self.stream.current_span();
    match self.stream.peek() {
      Some(Token::Str(value)) => {
        self.stream.advance();
        Ok(Expr::Text(value.clone(), span))
      }
      Some(Token::Number(value)) => {
        self.stream.advance();
        Ok(Expr::Number(*value, span))
      }
      Some(Token::True) => {
        self.stream.advance();
        Ok(Expr::Bool(true, span))
      }
      Some(Token::False) => {
        self.stream.advance();
        Ok(Expr::Bool(false, span))
      }
      Some(Token::Ident(_)) => {
        if matches!(self.stream.peek_nth(1), Some(Token::LParen)) {
          return Err(ParseError::new("action calls cannot be used as values", span));
        }
        let ident = self.stream.expect_ident("variable name")?;
        Ok(Expr::Variable(ident))
      }
      Some(Token::At) => {
        let start = self.stream.pos;
        self.stream.advance();
        let key = self.stream.expect_ident("external key after '@'")?;
        let annotation = if self.stream.check(&Token::Colon) {
          self.stream.advance();
          Some(self.stream.expect_ident("kind after ':'")?)
        } else {
          None
        };
        Ok(Expr::External {
          key,
          annotation,
          span: self.stream.span_from(start),
        })
      }
      Some(Token::LParen) => {
        self.stream.advance();
        let inner = self.nested(Self::expr)?;
        self.stream.expect(Token::RParen)?;
        Ok(inner)
      }
      _ => Err(ParseError::new(
        format!("expected expression, found {}", self.stream.found()),
        span,
      )),
    }
  }
}

/// Parse a token stream into a [`SyntaxTree`], reporting every syntax error.
pub fn parse(source: &str, tokens: &[(Token, Span)]) -> Result<SyntaxTree, Vec<Diagnostic>> {
  let mut parser = Parser {
    stream: TokenStream::new(tokens, source.len()),
    errors: Vec::new(),
    depth: 0,
    too_deep: false,
  };
  let statements = parser.statements(false);

  if parser.errors.is_empty() {
    Ok(SyntaxTree { statements })
  } else {
    Err(
      parser
        .errors
        .into_iter()
        .map(|err| Diagnostic::new(Position::from_offset(source, err.span.start), err.message))
        .collect(),
    )
  }
}
