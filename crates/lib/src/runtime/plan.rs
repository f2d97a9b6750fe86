//! Pure evaluation of a bound script into device steps.
//!
//! `let` bindings, conditions and arguments are evaluated up front without
//! touching the device. Only the taken branch of a conditional contributes
//! steps, so the step count is known before the first step runs.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::syntax::{ActionKind, BoundExpr, CompareOp, Invocation, Position, Script, Statement, Value, ValueKind};

/// Evaluation faults. A script accepted by the binder and run with validated
/// assignments never produces one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
  #[error("variable '{0}' read before it was assigned")]
  UnboundVariable(String),

  #[error("no value for '@{0}'")]
  UnassignedExternal(String),

  #[error("expected {expected}, found {found}")]
  KindMismatch { expected: ValueKind, found: ValueKind },

  #[error("'{action}' is missing argument {index}")]
  MissingArgument { action: ActionKind, index: usize },
}

/// A fully parameterized device action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Flash { image: PathBuf, disk: u32 },
  ApplyImage { wim: PathBuf, index: u32, disk: u32 },
  InjectDrivers { origin: PathBuf },
  ToggleDualBoot { disk: u32, enabled: bool },
  DisplayMarkdown { message: String },
  FetchRepository { url: String, branch: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
  pub index: usize,
  pub kind: ActionKind,
  pub action: Action,
  pub position: Position,
}

impl Step {
  pub fn description(&self) -> &'static str {
    self.kind.description()
  }
}

struct Evaluator<'a> {
  assignments: &'a HashMap<String, Value>,
  slots: Vec<Option<Value>>,
  steps: Vec<Step>,
}

impl Evaluator<'_> {
  fn eval(&self, expr: &BoundExpr) -> Result<Value, EvalError> {
    match expr {
      BoundExpr::Literal(value) => Ok(value.clone()),
      BoundExpr::Variable { slot, name } => self
        .slots
        .get(*slot)
        .cloned()
        .flatten()
        .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
      BoundExpr::External { key, .. } => self
        .assignments
        .get(key)
        .cloned()
        .ok_or_else(|| EvalError::UnassignedExternal(key.clone())),
      BoundExpr::TextAsWim(inner) => match self.eval(inner)? {
        Value::Text { value } => Ok(Value::Wim {
          path: PathBuf::from(value),
          index: 1,
        }),
        other => Err(EvalError::KindMismatch {
          expected: ValueKind::Text,
          found: other.kind(),
        }),
      },
      BoundExpr::Not(inner) => Ok(Value::Bool {
        value: !self.eval_bool(inner)?,
      }),
      BoundExpr::Compare { op, left, right } => {
        let equal = self.eval(left)?.script_eq(&self.eval(right)?);
        Ok(Value::Bool {
          value: match op {
            CompareOp::Eq => equal,
            CompareOp::NotEq => !equal,
          },
        })
      }
    }
  }

  fn eval_bool(&self, expr: &BoundExpr) -> Result<bool, EvalError> {
    match self.eval(expr)? {
      Value::Bool { value } => Ok(value),
      other => Err(mismatch(ValueKind::Bool, &other)),
    }
  }

  fn run(&mut self, statements: &[Statement]) -> Result<(), EvalError> {
    for statement in statements {
      match statement {
        Statement::Let { slot, value, .. } => {
          let value = self.eval(value)?;
          if let Some(entry) = self.slots.get_mut(*slot) {
            *entry = Some(value);
          }
        }
        Statement::Invoke(invocation) => {
          let action = self.action(invocation)?;
          self.steps.push(Step {
            index: self.steps.len(),
            kind: invocation.action,
            action,
            position: invocation.position,
          });
        }
        Statement::If {
          condition,
          then_branch,
          else_branch,
        } => {
          if self.eval_bool(condition)? {
            self.run(then_branch)?;
          } else {
            self.run(else_branch)?;
          }
        }
      }
    }
    Ok(())
  }

  fn action(&self, invocation: &Invocation) -> Result<Action, EvalError> {
    let arg = |index: usize| -> Result<Value, EvalError> {
      let expr = invocation.args.get(index).ok_or(EvalError::MissingArgument {
        action: invocation.action,
        index,
      })?;
      self.eval(expr)
    };

    Ok(match invocation.action {
      ActionKind::Flash => Action::Flash {
        image: PathBuf::from(text(arg(0)?)?),
        disk: disk(arg(1)?)?,
      },
      ActionKind::ApplyImage => {
        let (wim, index) = wim(arg(0)?)?;
        Action::ApplyImage {
          wim,
          index,
          disk: disk(arg(1)?)?,
        }
      }
      ActionKind::InjectDrivers => Action::InjectDrivers {
        origin: PathBuf::from(text(arg(0)?)?),
      },
      ActionKind::EnableDualBoot => Action::ToggleDualBoot {
        disk: disk(arg(0)?)?,
        enabled: true,
      },
      ActionKind::DisableDualBoot => Action::ToggleDualBoot {
        disk: disk(arg(0)?)?,
        enabled: false,
      },
      ActionKind::DisplayMarkdown => Action::DisplayMarkdown {
        message: text(arg(0)?)?,
      },
      ActionKind::FetchRepository => Action::FetchRepository {
        url: text(arg(0)?)?,
        branch: text(arg(1)?)?,
      },
    })
  }
}

fn mismatch(expected: ValueKind, found: &Value) -> EvalError {
  EvalError::KindMismatch {
    expected,
    found: found.kind(),
  }
}

fn text(value: Value) -> Result<String, EvalError> {
  match value {
    Value::Text { value } => Ok(value),
    other => Err(mismatch(ValueKind::Text, &other)),
  }
}

fn disk(value: Value) -> Result<u32, EvalError> {
  match value {
    Value::Disk { index } => Ok(index),
    other => Err(mismatch(ValueKind::Disk, &other)),
  }
}

fn wim(value: Value) -> Result<(PathBuf, u32), EvalError> {
  match value {
    Value::Wim { path, index } => Ok((path, index)),
    other => Err(mismatch(ValueKind::Wim, &other)),
  }
}

/// Evaluate `script` against `assignments` into its ordered steps.
pub fn plan(script: &Script, assignments: &HashMap<String, Value>) -> Result<Vec<Step>, EvalError> {
  let mut evaluator = Evaluator {
    assignments,
    slots: vec![None; script.slot_count()],
    steps: Vec::new(),
  };
  evaluator.run(script.statements())?;
  Ok(evaluator.steps)
}
