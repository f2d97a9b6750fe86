//! Implementation of the `deployer requirements` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use deployer_lib::analyze;

use super::load_script;
use crate::output::{OutputFormat, print_info, print_json, symbols};

/// Print every external input of a script, in first-use order.
pub fn cmd_requirements(file: &Path, output: OutputFormat) -> Result<()> {
  let script = load_script(file)?;
  let requirements = analyze(&script).with_context(|| format!("Failed to analyze {}", file.display()))?;

  if output.is_json() {
    return print_json(&requirements);
  }

  if requirements.is_empty() {
    print_info("Script needs no external inputs");
    return Ok(());
  }

  for requirement in &requirements {
    println!(
      "  {} {} {}",
      symbols::INFO,
      format!("@{}", requirement.key).if_supports_color(Stream::Stdout, |s| s.cyan()),
      format!("({})", requirement.kind).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  Ok(())
}
