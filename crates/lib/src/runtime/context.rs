use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::device::Collaborators;
use crate::paths::artifacts_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// Root for run artifacts (driver metadata, downloaded repositories).
  pub artifacts_dir: PathBuf,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      artifacts_dir: artifacts_dir(),
    }
  }
}

/// Live handle to the target device for script runs.
///
/// At most one run may use a context at a time.
#[derive(Debug)]
pub struct OperationContext {
  collaborators: Collaborators,
  config: RuntimeConfig,
  run_guard: Arc<Mutex<()>>,
}

/// Held for the duration of one run; dropping it frees the context.
pub(crate) type RunGuard = OwnedMutexGuard<()>;

impl OperationContext {
  pub fn new(collaborators: Collaborators, config: RuntimeConfig) -> Self {
    Self {
      collaborators,
      config,
      run_guard: Arc::new(Mutex::new(())),
    }
  }

  pub fn collaborators(&self) -> &Collaborators {
    &self.collaborators
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  pub fn is_busy(&self) -> bool {
    self.run_guard.try_lock().is_err()
  }

  /// Claim the context without waiting.
  pub(crate) fn try_begin_run(&self) -> Option<RunGuard> {
    self.run_guard.clone().try_lock_owned().ok()
  }
}
