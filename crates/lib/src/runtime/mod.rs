//! Execution of compiled scripts against a device.
//!
//! [`execute`] validates assignments, claims the [`OperationContext`], plans
//! the script into steps and runs them one by one as [`DeploymentTask`]s,
//! reporting [`Progress`] on an unbounded channel.

mod context;
mod error;
mod executor;
pub mod metadata;
pub mod plan;
pub mod progress;
mod tasks;

pub use context::{OperationContext, RuntimeConfig};
pub use error::{DeployerError, TaskError};
pub use executor::execute;
pub use plan::{Action, EvalError, Step};
pub use progress::{Progress, ProgressReceiver, ProgressSender, StepProgress};
pub use tasks::{DeploymentTask, TaskEnv, task_for};
