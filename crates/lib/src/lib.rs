//! deployer-lib: Core types and logic for Deployer
//!
//! This crate turns an operator-authored deployment script into a safely
//! ordered sequence of device actions:
//! - `syntax`: lexing, parsing and binding source text into a [`Script`]
//! - `requirements`: static discovery and resolution of external inputs
//! - `runtime`: sequential execution of a bound script against a device
//! - `device`: collaborator traits and the file-backed loopback device
//! - `outcome`: the shared result discipline used by every stage

pub mod consts;
pub mod device;
pub mod github;
pub mod outcome;
pub mod paths;
pub mod requirements;
pub mod runtime;
pub mod syntax;

pub use outcome::{Either, Items, Success};
pub use requirements::{Assignment, Requirement, RequirementKind, analyze};
pub use runtime::{DeployerError, OperationContext, execute};
pub use syntax::{CompilerError, Script, compile};
