//! Implementation of the `deployer check` command.
//!
//! Compiles a script and analyzes its requirements without touching a device.

use std::path::Path;

use anyhow::{Context, Result};

use deployer_lib::analyze;

use super::load_script;
use crate::output::{print_stat, print_success};

pub fn cmd_check(file: &Path) -> Result<()> {
  let script = load_script(file)?;
  let requirements = analyze(&script).with_context(|| format!("Failed to analyze {}", file.display()))?;

  print_success(&format!("{} compiled", file.display()));
  print_stat("Actions", &script.invocations().len().to_string());
  print_stat("Requirements", &requirements.len().to_string());
  Ok(())
}
