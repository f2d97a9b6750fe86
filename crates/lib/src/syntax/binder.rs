//! Name, kind and arity resolution.
//!
//! The binder turns the untyped [`SyntaxTree`] into a [`Script`]. Every action
//! call is checked against the registry, every variable reference against the
//! enclosing scopes, and every argument against its parameter kind.
//!
//! External references (`@key`) get their kind from an explicit annotation or
//! from the first typed parameter they flow into, directly or through a `let`
//! alias. Once the whole tree is bound the inferred kinds are written back into
//! every occurrence of the key.

use std::collections::HashMap;

use super::actions::{self, ActionSpec, ParamSpec};
use super::ast::{Block, Call, Expr, Stmt, SyntaxTree};
use super::script::{BoundExpr, Invocation, Script, Statement, Value, ValueKind};
use super::{Diagnostic, Position, Span};
use crate::requirements::RequirementKind;

/// Kind of a bound expression as far as the binder knows it.
#[derive(Debug, Clone, PartialEq)]
enum Ty {
  Known(ValueKind),
  /// Value of an external whose kind may not be decided yet.
  External(String),
}

#[derive(Debug, Clone)]
struct Variable {
  slot: usize,
  /// `None` when the initializer failed to bind; uses are not re-checked.
  ty: Option<Ty>,
}

struct Binder<'src> {
  source: &'src str,
  scopes: Vec<HashMap<String, Variable>>,
  slots: usize,
  externals: HashMap<String, RequirementKind>,
  /// Operand kinds of every comparison, checked once all externals are settled.
  comparisons: Vec<(Ty, Ty, Span)>,
  errors: Vec<Diagnostic>,
}

impl<'src> Binder<'src> {
  fn error(&mut self, span: &Span, message: impl Into<String>) {
    self
      .errors
      .push(Diagnostic::new(Position::from_offset(self.source, span.start), message));
  }

  fn position(&self, span: &Span) -> Position {
    Position::from_offset(self.source, span.start)
  }

  fn lookup(&self, name: &str) -> Option<&Variable> {
    self.scopes.iter().rev().find_map(|scope| scope.get(name))
  }

  /// Kind of `ty` if it is decided.
  fn settled(&self, ty: &Ty) -> Option<ValueKind> {
    match ty {
      Ty::Known(kind) => Some(*kind),
      Ty::External(key) => self.externals.get(key).map(|kind| kind.value_kind()),
    }
  }

  fn describe(&self, ty: &Ty) -> String {
    match ty {
      Ty::Known(kind) => kind.to_string(),
      Ty::External(key) => match self.externals.get(key) {
        Some(kind) => format!("external '@{}' ({})", key, kind.value_kind()),
        None => format!("external '@{}'", key),
      },
    }
  }

  fn note_kind(&mut self, key: &str, kind: RequirementKind, span: &Span) {
    match self.externals.get(key) {
      Some(existing) if *existing != kind => {
        let message = format!("conflicting kinds for '@{}': {} and {}", key, existing, kind);
        self.error(span, message);
      }
      Some(_) => {}
      None => {
        self.externals.insert(key.to_string(), kind);
      }
    }
  }

  fn check_comparisons(&mut self) {
    for (left, right, span) in std::mem::take(&mut self.comparisons) {
      if let (Some(a), Some(b)) = (self.settled(&left), self.settled(&right))
        && !a.comparable_with(b)
      {
        self.error(&span, format!("cannot compare {} with {}", a, b));
      }
    }
  }

  fn block(&mut self, statements: &[Stmt]) -> Vec<Statement> {
    self.scopes.push(HashMap::new());
    let bound = statements.iter().filter_map(|stmt| self.statement(stmt)).collect();
    self.scopes.pop();
    bound
  }

  fn nested(&mut self, block: Option<&Block>) -> Vec<Statement> {
    match block {
      Some(block) => self.block(&block.statements),
      None => Vec::new(),
    }
  }

  fn statement(&mut self, stmt: &Stmt) -> Option<Statement> {
    match stmt {
      Stmt::Let { name, value } => {
        let (value, ty) = self.expr(value);
        let declared = self.scopes.last().is_some_and(|scope| scope.contains_key(&name.name));
        if declared {
          self.error(
            &name.span,
            format!("variable '{}' is already declared in this scope", name.name),
          );
          return None;
        }
        let slot = self.slots;
        self.slots += 1;
        if let Some(scope) = self.scopes.last_mut() {
          scope.insert(name.name.clone(), Variable { slot, ty });
        }
        Some(Statement::Let {
          slot,
          name: name.name.clone(),
          value,
        })
      }
      Stmt::Call(call) => self.call(call).map(Statement::Invoke),
      Stmt::If {
        condition,
        then_block,
        else_block,
      } => {
        let span = condition.span();
        let (condition, ty) = self.expr(condition);
        if let Some(ty) = ty
          && self.settled(&ty) != Some(ValueKind::Bool)
        {
          let message = format!("condition must be bool, found {}", self.describe(&ty));
          self.error(&span, message);
        }
        let then_branch = self.block(&then_block.statements);
        let else_branch = self.nested(else_block.as_ref());
        Some(Statement::If {
          condition,
          then_branch,
          else_branch,
        })
      }
    }
  }

  fn expr(&mut self, expr: &Expr) -> (BoundExpr, Option<Ty>) {
    match expr {
      Expr::Text(value, _) => (BoundExpr::Literal(Value::text(value.clone())), Some(Ty::Known(ValueKind::Text))),
      Expr::Number(value, _) => (
        BoundExpr::Literal(Value::Number { value: *value }),
        Some(Ty::Known(ValueKind::Number)),
      ),
      Expr::Bool(value, _) => (
        BoundExpr::Literal(Value::Bool { value: *value }),
        Some(Ty::Known(ValueKind::Bool)),
      ),
      Expr::Variable(ident) => match self.lookup(&ident.name).cloned() {
        Some(variable) => (
          BoundExpr::Variable {
            slot: variable.slot,
            name: ident.name.clone(),
          },
          variable.ty,
        ),
        None => {
          self.error(&ident.span, format!("undeclared variable '{}'", ident.name));
          (BoundExpr::Literal(Value::Bool { value: false }), None)
        }
      },
      Expr::External { key, annotation, span } => {
        if let Some(annotation) = annotation {
          match RequirementKind::from_annotation(&annotation.name) {
            Some(kind) => self.note_kind(&key.name, kind, &annotation.span),
            None => self.error(
              &annotation.span,
              format!(
                "unknown kind '{}' for '@{}' (expected disk or wim)",
                annotation.name, key.name
              ),
            ),
          }
        }
        (
          BoundExpr::External {
            key: key.name.clone(),
            kind: None,
            position: self.position(span),
          },
          Some(Ty::External(key.name.clone())),
        )
      }
      Expr::Not(inner, _) => {
        let span = inner.span();
        let (bound, ty) = self.expr(inner);
        if let Some(ty) = ty
          && self.settled(&ty) != Some(ValueKind::Bool)
        {
          let message = format!("'!' expects bool, found {}", self.describe(&ty));
          self.error(&span, message);
        }
        (BoundExpr::Not(Box::new(bound)), Some(Ty::Known(ValueKind::Bool)))
      }
      Expr::Compare { op, left, right, span } => {
        let (left, left_ty) = self.expr(left);
        let (right, right_ty) = self.expr(right);
        if let (Some(left_ty), Some(right_ty)) = (left_ty, right_ty) {
          self.comparisons.push((left_ty, right_ty, span.clone()));
        }
        (
          BoundExpr::Compare {
            op: *op,
            left: Box::new(left),
            right: Box::new(right),
          },
          Some(Ty::Known(ValueKind::Bool)),
        )
      }
    }
  }

  /// Check one argument against its parameter, applying literal coercions.
  fn argument(&mut self, spec: &ActionSpec, index: usize, expr: &Expr) -> BoundExpr {
    let param: &ParamSpec = &spec.params[index];
    let span = expr.span();
    let (bound, ty) = self.expr(expr);
    let Some(ty) = ty else {
      return bound;
    };

    let mismatch = |found: String| {
      format!(
        "argument {} ('{}') of '{}' expects {}, found {}",
        index, param.name, spec.name, param.kind, found
      )
    };

    match (&ty, param.kind) {
      (Ty::Known(kind), expected) if *kind == expected => bound,
      (Ty::Known(ValueKind::Number), ValueKind::Disk) if expr.is_literal() => {
        let BoundExpr::Literal(Value::Number { value }) = bound else {
          return bound;
        };
        match u32::try_from(value) {
          Ok(index) => BoundExpr::Literal(Value::Disk { index }),
          Err(_) => {
            self.error(&span, format!("disk index {} is out of range", value));
            BoundExpr::Literal(Value::Disk { index: 0 })
          }
        }
      }
      (Ty::Known(ValueKind::Text), ValueKind::Wim) => BoundExpr::TextAsWim(Box::new(bound)),
      (Ty::External(key), ValueKind::Disk) => {
        self.note_kind(key, RequirementKind::Disk, &span);
        bound
      }
      (Ty::External(key), ValueKind::Wim) => {
        self.note_kind(key, RequirementKind::WimFile, &span);
        bound
      }
      _ => {
        let message = mismatch(self.describe(&ty));
        self.error(&span, message);
        bound
      }
    }
  }

  fn call(&mut self, call: &Call) -> Option<Invocation> {
    let Some(spec) = actions::lookup(&call.name.name) else {
      self.error(&call.name.span, format!("unknown action '{}'", call.name.name));
      for arg in &call.args {
        self.expr(&arg.value);
      }
      return None;
    };

    let mut slots: Vec<Option<BoundExpr>> = vec![None; spec.params.len()];
    let mut seen_named = false;
    let mut arity_reported = false;

    for (position, arg) in call.args.iter().enumerate() {
      let index = match &arg.name {
        None if seen_named => {
          self.error(&arg.value.span(), "positional argument after named argument");
          continue;
        }
        None if position >= spec.params.len() => {
          if !arity_reported {
            arity_reported = true;
            let given = call.args.iter().filter(|a| a.name.is_none()).count();
            self.error(
              &arg.value.span(),
              format!(
                "'{}' takes {} argument(s) but {} were given",
                spec.name,
                spec.params.len(),
                given
              ),
            );
          }
          self.expr(&arg.value);
          continue;
        }
        None => position,
        Some(name) => {
          seen_named = true;
          match spec.params.iter().position(|p| p.name == name.name) {
            Some(index) if slots[index].is_some() => {
              self.error(&name.span, format!("argument '{}' given more than once", name.name));
              continue;
            }
            Some(index) => index,
            None => {
              self.error(
                &name.span,
                format!("'{}' has no parameter named '{}'", spec.name, name.name),
              );
              self.expr(&arg.value);
              continue;
            }
          }
        }
      };
      let bound = self.argument(spec, index, &arg.value);
      slots[index] = Some(bound);
    }

    // missing arguments are reported at the closing parenthesis
    let closing = call.span.end.saturating_sub(1)..call.span.end;
    let mut args = Vec::with_capacity(slots.len());
    for (param, slot) in spec.params.iter().zip(slots) {
      match (slot, param.default) {
        (Some(bound), _) => args.push(bound),
        (None, Some(default)) => args.push(BoundExpr::Literal(Value::text(default))),
        (None, None) => {
          self.error(
            &closing,
            format!("missing argument '{}' for '{}'", param.name, spec.name),
          );
        }
      }
    }

    Some(Invocation {
      action: spec.kind,
      args,
      position: self.position(&call.span),
    })
  }
}

fn fill_kinds(statements: &mut [Statement], kinds: &HashMap<String, RequirementKind>) {
  fn expr(bound: &mut BoundExpr, kinds: &HashMap<String, RequirementKind>) {
    match bound {
      BoundExpr::External { key, kind, .. } => *kind = kinds.get(key.as_str()).copied(),
      BoundExpr::TextAsWim(inner) | BoundExpr::Not(inner) => expr(inner, kinds),
      BoundExpr::Compare { left, right, .. } => {
        expr(left, kinds);
        expr(right, kinds);
      }
      BoundExpr::Literal(_) | BoundExpr::Variable { .. } => {}
    }
  }

  for statement in statements {
    match statement {
      Statement::Let { value, .. } => expr(value, kinds),
      Statement::Invoke(invocation) => invocation.args.iter_mut().for_each(|arg| expr(arg, kinds)),
      Statement::If {
        condition,
        then_branch,
        else_branch,
      } => {
        expr(condition, kinds);
        fill_kinds(then_branch, kinds);
        fill_kinds(else_branch, kinds);
      }
    }
  }
}

/// Bind a syntax tree against the action registry.
pub fn bind(source: &str, tree: &SyntaxTree) -> Result<Script, Vec<Diagnostic>> {
  let mut binder = Binder {
    source,
    scopes: Vec::new(),
    slots: 0,
    externals: HashMap::new(),
    comparisons: Vec::new(),
    errors: Vec::new(),
  };
  let mut statements = binder.block(&tree.statements);
  binder.check_comparisons();

  if !binder.errors.is_empty() {
    binder.errors.sort_by_key(|d| d.position.offset);
    return Err(binder.errors);
  }

  fill_kinds(&mut statements, &binder.externals);
  Ok(Script::new(statements, binder.slots))
}
