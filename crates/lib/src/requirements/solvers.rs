//! Programmatic solvers.
//!
//! [`Presets`] answers requirements from values supplied up front (command
//! line flags, test fixtures) without ever suspending.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::manager::{RequirementSolver, SolverError, SolverRegistry};
use super::types::{Assignment, Requirement, RequirementKind, RequirementRequest, RequirementResponse};
use crate::syntax::Value;

/// Values supplied ahead of resolution, keyed by requirement key.
#[derive(Debug, Clone, Default)]
pub struct Presets {
  values: HashMap<String, Value>,
}

impl Presets {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn disk(mut self, key: impl Into<String>, index: u32) -> Self {
    self.values.insert(key.into(), Value::Disk { index });
    self
  }

  pub fn wim(mut self, key: impl Into<String>, path: impl Into<PathBuf>, index: u32) -> Self {
    self.values.insert(
      key.into(),
      Value::Wim {
        path: path.into(),
        index,
      },
    );
    self
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Presets as assignments, sorted by key.
  pub fn assignments(&self) -> Vec<Assignment> {
    let mut assignments: Vec<_> = self
      .values
      .iter()
      .map(|(key, value)| Assignment {
        key: key.clone(),
        value: value.clone(),
      })
      .collect();
    assignments.sort_by(|a, b| a.key.cmp(&b.key));
    assignments
  }

  /// Register a preset-backed factory for every requirement kind.
  pub fn register_into(self, registry: &mut SolverRegistry) {
    let values = Arc::new(self.values);
    for kind in [RequirementKind::Disk, RequirementKind::WimFile] {
      let values = values.clone();
      registry.register(kind, move |requirement: &Requirement| -> Box<dyn RequirementSolver> {
        Box::new(PresetSolver {
          value: values.get(&requirement.key).cloned(),
        })
      });
    }
  }
}

/// Answers with a fixed value, or fails when none was supplied.
#[derive(Debug, Clone)]
pub struct PresetSolver {
  value: Option<Value>,
}

#[async_trait]
impl RequirementSolver for PresetSolver {
  async fn solve(&self, request: RequirementRequest) -> Result<RequirementResponse, SolverError> {
    let key = request.key().to_string();
    match (&request, &self.value) {
      (RequirementRequest::Disk { .. }, Some(Value::Disk { index })) => Ok(RequirementResponse::Disk { key, index: *index }),
      (RequirementRequest::WimFile { .. }, Some(Value::Wim { path, index })) => Ok(RequirementResponse::WimFile {
        key,
        path: path.clone(),
        index: *index,
      }),
      (_, Some(value)) => Err(SolverError::Failed(format!(
        "value {} supplied for '@{}' is not a {}",
        value,
        key,
        request.kind()
      ))),
      (_, None) => Err(SolverError::Failed(format!("no value supplied for '@{}'", key))),
    }
  }
}
