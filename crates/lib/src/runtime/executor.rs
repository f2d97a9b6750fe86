//! Sequential execution of a bound script.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::context::OperationContext;
use super::error::DeployerError;
use super::plan::{Step, plan};
use super::progress::{Progress, ProgressSender, StepProgress};
use super::tasks::{TaskEnv, task_for};
use crate::outcome::Success;
use crate::requirements::{Assignment, analyze, missing_requirements};
use crate::syntax::{Script, Value};

/// Check `assignments` against the requirements of `script`.
fn validate(script: &Script, assignments: &[Assignment]) -> Result<HashMap<String, Value>, DeployerError> {
  let requirements = analyze(script)?;

  let missing = missing_requirements(&requirements, assignments);
  if !missing.is_empty() {
    return Err(DeployerError::MissingAssignments { missing });
  }

  let values: HashMap<String, Value> = assignments
    .iter()
    .map(|a| (a.key.clone(), a.value.clone()))
    .collect();

  for requirement in &requirements {
    let Some(value) = values.get(&requirement.key) else {
      continue;
    };
    if value.kind() != requirement.kind.value_kind() {
      return Err(DeployerError::InvalidAssignment {
        key: requirement.key.clone(),
        expected: requirement.kind,
        found: value.kind(),
      });
    }
  }

  Ok(values)
}

/// Run `script` against the device behind `context`.
///
/// Steps run strictly in order and the first failure stops the run; nothing
/// is rolled back. `progress` is dropped before this returns, so no
/// notification follows the result.
pub async fn execute(
  script: &Script,
  assignments: &[Assignment],
  context: &OperationContext,
  progress: ProgressSender,
  cancel: CancellationToken,
) -> Result<Success, DeployerError> {
  let values = validate(script, assignments)?;
  let _guard = context.try_begin_run().ok_or(DeployerError::ContextBusy)?;
  let steps = plan(script, &values)?;

  let result = run_steps(&steps, context, &progress, &cancel).await;
  drop(progress);
  result
}

async fn run_steps(
  steps: &[Step],
  context: &OperationContext,
  progress: &ProgressSender,
  cancel: &CancellationToken,
) -> Result<Success, DeployerError> {
  let total = steps.len();
  let mut items = Vec::with_capacity(total);
  info!(steps = total, "executing script");

  for step in steps {
    if cancel.is_cancelled() {
      warn!(step = step.index, "run cancelled");
      return Err(DeployerError::Cancelled {
        index: step.index,
        description: step.description().to_string(),
        items,
      });
    }

    info!(step = step.index, action = %step.kind, "running step");
    let step_progress = StepProgress::new(progress.clone(), step.index, total);
    step_progress.report(0.0);

    let env = TaskEnv {
      collaborators: context.collaborators(),
      config: context.config(),
      progress: &step_progress,
      cancel,
    };

    match task_for(&step.action).execute(&env).await {
      Ok(item) => {
        step_progress.report(1.0);
        items.push(item);
      }
      Err(e) if e.is_cancelled() => {
        warn!(step = step.index, "run cancelled during step");
        return Err(DeployerError::Cancelled {
          index: step.index,
          description: step.description().to_string(),
          items,
        });
      }
      Err(e) => {
        error!(step = step.index, action = %step.kind, error = %e, "step failed");
        return Err(DeployerError::StepFailed {
          index: step.index,
          description: step.description().to_string(),
          source: e,
          items,
        });
      }
    }
  }

  let _ = progress.send(Progress {
    step: total,
    total,
    fraction: 1.0,
  });
  info!("script completed");
  Ok(Success::new(items))
}
