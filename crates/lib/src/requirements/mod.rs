//! External inputs of a script: discovery and resolution.
//!
//! 1. [`analyze`] lists the requirements of a compiled script
//! 2. [`missing_requirements`] diffs them against values already known
//! 3. [`RequirementsManager::resolve`] asks the registered solvers for the rest

mod analyzer;
mod manager;
mod solvers;
mod types;

pub use analyzer::{AnalysisError, analyze};
pub use manager::{
  RequirementSolver, RequirementsManager, ResolutionError, SolverError, SolverFactory, SolverRegistry,
  missing_requirements,
};
pub use solvers::{PresetSolver, Presets};
pub use types::{Assignment, Requirement, RequirementKind, RequirementRequest, RequirementResponse};
