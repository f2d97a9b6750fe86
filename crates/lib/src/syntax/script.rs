//! The bound, immutable form of a compiled script.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ActionKind, Position};
use crate::requirements::RequirementKind;

pub use super::ast::CompareOp;

/// Static kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
  Text,
  Number,
  Bool,
  Disk,
  Wim,
}

impl ValueKind {
  /// Kinds that `==`/`!=` may compare. A disk compares with its index, a WIM
  /// with its path.
  pub fn comparable_with(self, other: ValueKind) -> bool {
    use ValueKind::*;
    self == other || matches!((self, other), (Disk, Number) | (Number, Disk) | (Wim, Text) | (Text, Wim))
  }
}

impl fmt::Display for ValueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ValueKind::Text => "text",
      ValueKind::Number => "number",
      ValueKind::Bool => "bool",
      ValueKind::Disk => "disk",
      ValueKind::Wim => "wim",
    };
    f.write_str(name)
  }
}

/// Kind-tagged runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Value {
  Text { value: String },
  Number { value: i64 },
  Bool { value: bool },
  Disk { index: u32 },
  Wim { path: PathBuf, index: u32 },
}

impl Value {
  pub fn text(value: impl Into<String>) -> Self {
    Value::Text { value: value.into() }
  }

  pub fn kind(&self) -> ValueKind {
    match self {
      Value::Text { .. } => ValueKind::Text,
      Value::Number { .. } => ValueKind::Number,
      Value::Bool { .. } => ValueKind::Bool,
      Value::Disk { .. } => ValueKind::Disk,
      Value::Wim { .. } => ValueKind::Wim,
    }
  }

  /// Equality as seen by `==` in scripts.
  pub fn script_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Disk { index }, Value::Number { value }) | (Value::Number { value }, Value::Disk { index }) => {
        i64::from(*index) == *value
      }
      (Value::Wim { path, .. }, Value::Text { value }) | (Value::Text { value }, Value::Wim { path, .. }) => {
        path.as_os_str() == value.as_str()
      }
      _ => self == other,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Text { value } => write!(f, "{:?}", value),
      Value::Number { value } => write!(f, "{}", value),
      Value::Bool { value } => write!(f, "{}", value),
      Value::Disk { index } => write!(f, "disk {}", index),
      Value::Wim { path, index } => write!(f, "{}#{}", path.display(), index),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundExpr {
  Literal(Value),
  Variable {
    slot: usize,
    name: String,
  },
  /// `kind` is filled in once the whole script is bound; `None` means no
  /// typed parameter ever consumed this key.
  External {
    key: String,
    kind: Option<RequirementKind>,
    position: Position,
  },
  /// Text accepted where a WIM is expected (image index 1).
  TextAsWim(Box<BoundExpr>),
  Not(Box<BoundExpr>),
  Compare {
    op: CompareOp,
    left: Box<BoundExpr>,
    right: Box<BoundExpr>,
  },
}

/// One action call with its arguments in parameter order, defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub action: ActionKind,
  pub args: Vec<BoundExpr>,
  pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
  Let {
    slot: usize,
    name: String,
    value: BoundExpr,
  },
  Invoke(Invocation),
  If {
    condition: BoundExpr,
    then_branch: Vec<Statement>,
    else_branch: Vec<Statement>,
  },
}

/// A compiled script. Only [`compile`](super::compile) creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
  statements: Vec<Statement>,
  slots: usize,
}

impl Script {
  pub(crate) fn new(statements: Vec<Statement>, slots: usize) -> Self {
    Self { statements, slots }
  }

  pub fn statements(&self) -> &[Statement] {
    &self.statements
  }

  /// Number of variable slots the runtime environment needs.
  pub fn slot_count(&self) -> usize {
    self.slots
  }

  /// Every invocation in source order, including both branches of conditionals.
  pub fn invocations(&self) -> Vec<&Invocation> {
    fn walk<'a>(statements: &'a [Statement], out: &mut Vec<&'a Invocation>) {
      for statement in statements {
        match statement {
          Statement::Invoke(invocation) => out.push(invocation),
          Statement::If {
            then_branch,
            else_branch,
            ..
          } => {
            walk(then_branch, out);
            walk(else_branch, out);
          }
          Statement::Let { .. } => {}
        }
      }
    }
    let mut out = Vec::new();
    walk(&self.statements, &mut out);
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disks_compare_with_numbers() {
    let disk = Value::Disk { index: 2 };
    assert!(disk.script_eq(&Value::Number { value: 2 }));
    assert!(!disk.script_eq(&Value::Number { value: 3 }));
    assert!(Value::Number { value: 2 }.script_eq(&disk));
  }

  #[test]
  fn wims_compare_with_their_path() {
    let wim = Value::Wim {
      path: PathBuf::from("install.wim"),
      index: 3,
    };
    assert!(wim.script_eq(&Value::text("install.wim")));
    assert!(!wim.script_eq(&Value::text("boot.wim")));
  }

  #[test]
  fn comparable_kinds() {
    assert!(ValueKind::Disk.comparable_with(ValueKind::Number));
    assert!(ValueKind::Text.comparable_with(ValueKind::Wim));
    assert!(!ValueKind::Bool.comparable_with(ValueKind::Text));
  }

  #[test]
  fn value_serializes_with_kind_tag() {
    let json = serde_json::to_string(&Value::Disk { index: 1 }).unwrap();
    assert_eq!(json, r#"{"kind":"disk","index":1}"#);
  }
}
