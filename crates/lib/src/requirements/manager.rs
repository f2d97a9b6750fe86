//! Requirement resolution.
//!
//! The [`RequirementsManager`] fans every unresolved requirement out to a
//! solver built by the [`SolverRegistry`] and waits for all of them. Resolution
//! is all-or-nothing: one failing, missing or mismatched solver, or a cancelled
//! token, aborts the rest and no assignment is returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{Assignment, Requirement, RequirementKind, RequirementRequest, RequirementResponse};

/// Errors a single solver may report.
#[derive(Debug, Error)]
pub enum SolverError {
  /// The operator refused to provide a value.
  #[error("no value was provided")]
  Declined,

  /// The solver could not produce a value.
  #[error("{0}")]
  Failed(String),

  /// Reading the operator's answer failed.
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ResolutionError {
  /// No factory is registered for the requirement's kind.
  #[error("no solver registered for {kind} requirement '@{key}'")]
  NoSolver { key: String, kind: RequirementKind },

  /// A solver reported an error.
  #[error("failed to resolve '@{key}'")]
  Solver {
    key: String,
    #[source]
    source: SolverError,
  },

  /// A solver answered for a different key or kind.
  #[error("solver for '@{key}' ({expected}) answered for '@{answered_key}' ({answered})")]
  Mismatch {
    key: String,
    expected: RequirementKind,
    answered_key: String,
    answered: RequirementKind,
  },

  /// The cancellation token fired before every solver answered.
  #[error("requirement resolution was cancelled")]
  Cancelled,

  /// A solver task panicked or was aborted.
  #[error("solver task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Produces a value for one requirement. May suspend indefinitely.
#[async_trait]
pub trait RequirementSolver: Send + Sync {
  async fn solve(&self, request: RequirementRequest) -> Result<RequirementResponse, SolverError>;
}

/// Builds a solver for a given requirement.
pub type SolverFactory = Arc<dyn Fn(&Requirement) -> Box<dyn RequirementSolver> + Send + Sync>;

/// Maps each requirement kind to the factory that builds its solver.
#[derive(Clone, Default)]
pub struct SolverRegistry {
  factories: HashMap<RequirementKind, SolverFactory>,
}

impl SolverRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register (or replace) the factory for `kind`.
  pub fn register<F>(&mut self, kind: RequirementKind, factory: F) -> &mut Self
  where
    F: Fn(&Requirement) -> Box<dyn RequirementSolver> + Send + Sync + 'static,
  {
    self.factories.insert(kind, Arc::new(factory));
    self
  }

  pub fn solver_for(&self, requirement: &Requirement) -> Option<Box<dyn RequirementSolver>> {
    self.factories.get(&requirement.kind).map(|factory| factory(requirement))
  }

  pub fn kinds(&self) -> impl Iterator<Item = RequirementKind> + '_ {
    self.factories.keys().copied()
  }
}

impl std::fmt::Debug for SolverRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SolverRegistry")
      .field("kinds", &self.factories.keys().collect::<Vec<_>>())
      .finish()
  }
}

/// Requirements whose key no assignment covers, in input order.
pub fn missing_requirements(requirements: &[Requirement], assignments: &[Assignment]) -> Vec<Requirement> {
  let known: HashSet<&str> = assignments.iter().map(|a| a.key.as_str()).collect();
  requirements
    .iter()
    .filter(|r| !known.contains(r.key.as_str()))
    .cloned()
    .collect()
}

#[derive(Debug, Clone)]
pub struct RequirementsManager {
  registry: SolverRegistry,
}

impl RequirementsManager {
  pub fn new(registry: SolverRegistry) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &SolverRegistry {
    &self.registry
  }

  /// Resolve every requirement not in `already_known`.
  ///
  /// Solvers run concurrently. The returned assignments follow the order of
  /// `requirements`.
  pub async fn resolve(
    &self,
    requirements: &[Requirement],
    already_known: &HashSet<String>,
    cancel: &CancellationToken,
  ) -> Result<Vec<Assignment>, ResolutionError> {
    let pending: Vec<&Requirement> = requirements
      .iter()
      .filter(|r| !already_known.contains(&r.key))
      .collect();

    if pending.is_empty() {
      return Ok(Vec::new());
    }

    // build every solver before starting any, so a missing kind fails fast
    let mut solvers = Vec::with_capacity(pending.len());
    for requirement in &pending {
      let solver = self
        .registry
        .solver_for(requirement)
        .ok_or_else(|| ResolutionError::NoSolver {
          key: requirement.key.clone(),
          kind: requirement.kind,
        })?;
      solvers.push(solver);
    }

    info!(count = pending.len(), "resolving requirements");

    let mut join_set = JoinSet::new();
    for (slot, (requirement, solver)) in pending.iter().zip(solvers).enumerate() {
      let request = RequirementRequest::for_requirement(requirement);
      join_set.spawn(async move { (slot, solver.solve(request).await) });
    }

    let mut resolved: Vec<Option<Assignment>> = vec![None; pending.len()];
    loop {
      let joined = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          join_set.abort_all();
          warn!("requirement resolution cancelled");
          return Err(ResolutionError::Cancelled);
        }
        joined = join_set.join_next() => joined,
      };

      let Some(joined) = joined else {
        break;
      };

      let (slot, outcome) = match joined {
        Ok(result) => result,
        Err(e) => {
          join_set.abort_all();
          return Err(ResolutionError::Task(e));
        }
      };
      let requirement = pending[slot];

      let response = match outcome {
        Ok(response) => response,
        Err(source) => {
          join_set.abort_all();
          warn!(key = %requirement.key, error = %source, "solver failed");
          return Err(ResolutionError::Solver {
            key: requirement.key.clone(),
            source,
          });
        }
      };

      if response.key() != requirement.key || response.kind() != requirement.kind {
        join_set.abort_all();
        return Err(ResolutionError::Mismatch {
          key: requirement.key.clone(),
          expected: requirement.kind,
          answered_key: response.key().to_string(),
          answered: response.kind(),
        });
      }

      debug!(key = %requirement.key, "requirement resolved");
      resolved[slot] = Some(Assignment::from(response));
    }

    Ok(resolved.into_iter().flatten().collect())
  }
}
