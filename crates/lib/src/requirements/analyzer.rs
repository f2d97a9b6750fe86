//! Static requirement discovery.
//!
//! The analyzer never evaluates anything: it walks every statement, including
//! both branches of each conditional, and collects the external references in
//! order of first occurrence.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use super::types::{Requirement, RequirementKind};
use crate::syntax::{BoundExpr, Position, Script, Statement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
  /// The external is only compared or never reaches a typed parameter.
  #[error("cannot determine the kind of '@{key}' at {position}; annotate it as '@{key}:disk' or '@{key}:wim'")]
  UnknownKind { key: String, position: Position },
}

type Found = IndexMap<String, (Option<RequirementKind>, Position)>;

fn visit_expr(expr: &BoundExpr, found: &mut Found) {
  match expr {
    BoundExpr::External { key, kind, position } => {
      found.entry(key.clone()).or_insert((*kind, *position));
    }
    BoundExpr::TextAsWim(inner) | BoundExpr::Not(inner) => visit_expr(inner, found),
    BoundExpr::Compare { left, right, .. } => {
      visit_expr(left, found);
      visit_expr(right, found);
    }
    BoundExpr::Literal(_) | BoundExpr::Variable { .. } => {}
  }
}

fn visit(statements: &[Statement], found: &mut Found) {
  for statement in statements {
    match statement {
      Statement::Let { value, .. } => visit_expr(value, found),
      Statement::Invoke(invocation) => {
        for arg in &invocation.args {
          visit_expr(arg, found);
        }
      }
      Statement::If {
        condition,
        then_branch,
        else_branch,
      } => {
        visit_expr(condition, found);
        visit(then_branch, found);
        visit(else_branch, found);
      }
    }
  }
}

/// List the requirements of `script`, one per distinct key.
pub fn analyze(script: &Script) -> Result<Vec<Requirement>, AnalysisError> {
  let mut found = Found::new();
  visit(script.statements(), &mut found);

  let requirements = found
    .into_iter()
    .map(|(key, (kind, position))| match kind {
      Some(kind) => Ok(Requirement { key, kind }),
      None => Err(AnalysisError::UnknownKind { key, position }),
    })
    .collect::<Result<Vec<_>, _>>()?;

  debug!(count = requirements.len(), "analyzed requirements");
  Ok(requirements)
}
