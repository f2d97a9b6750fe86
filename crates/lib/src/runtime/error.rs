use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::plan::EvalError;
use crate::device::{DeviceError, FetchError};
use crate::github::GitHubError;
use crate::outcome::Items;
use crate::requirements::{AnalysisError, Requirement, RequirementKind};
use crate::syntax::ValueKind;

/// Why a single deployment task failed.
#[derive(Debug, Error)]
pub enum TaskError {
  #[error(transparent)]
  Device(#[from] DeviceError),

  #[error(transparent)]
  GitHub(#[from] GitHubError),

  /// Writing a run artifact (driver metadata, downloaded archive) failed.
  #[error("failed to write {path}: {source}")]
  Artifact {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize driver metadata: {0}")]
  Metadata(#[from] serde_json::Error),
}

impl TaskError {
  pub fn is_cancelled(&self) -> bool {
    matches!(
      self,
      TaskError::Device(DeviceError::Cancelled)
        | TaskError::GitHub(GitHubError::Download {
          source: FetchError::Cancelled { .. },
          ..
        })
    )
  }
}

fn keys(requirements: &[Requirement]) -> String {
  requirements
    .iter()
    .map(|r| format!("'@{}'", r.key))
    .collect::<Vec<_>>()
    .join(", ")
}

#[derive(Debug, Error)]
pub enum DeployerError {
  /// Some requirements have no assignment.
  #[error("no value for {}", keys(.missing))]
  MissingAssignments { missing: Vec<Requirement> },

  /// An assignment's value does not match its requirement's kind.
  #[error("value for '@{key}' is {found} but the script needs {expected}")]
  InvalidAssignment {
    key: String,
    expected: RequirementKind,
    found: ValueKind,
  },

  /// Another run holds the operation context.
  #[error("the device is busy with another run")]
  ContextBusy,

  #[error(transparent)]
  Analysis(#[from] AnalysisError),

  #[error(transparent)]
  Evaluation(#[from] EvalError),

  /// Step `index` failed; steps after it never ran.
  #[error("step {} ({description}) failed: {source}", .index + 1)]
  StepFailed {
    index: usize,
    description: String,
    #[source]
    source: TaskError,
    items: Vec<String>,
  },

  /// The cancellation token fired before or during step `index`.
  #[error("cancelled at step {} ({description})", .index + 1)]
  Cancelled {
    index: usize,
    description: String,
    items: Vec<String>,
  },
}

impl Items for DeployerError {
  fn items(&self) -> &[String] {
    match self {
      DeployerError::StepFailed { items, .. } | DeployerError::Cancelled { items, .. } => items,
      _ => &[],
    }
  }
}
