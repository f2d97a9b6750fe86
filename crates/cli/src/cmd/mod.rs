mod check;
mod info;
mod init;
mod requirements;
mod run;

pub use check::cmd_check;
pub use info::cmd_info;
pub use init::cmd_init;
pub use requirements::cmd_requirements;
pub use run::{RunArgs, cmd_run};

use std::path::Path;

use anyhow::{Context, Result, bail};
use deployer_lib::{Script, compile};

use crate::output::print_error;

/// Read and compile a script, printing every diagnostic on failure.
fn load_script(file: &Path) -> Result<Script> {
  let source = std::fs::read_to_string(file).with_context(|| format!("Failed to read script: {}", file.display()))?;

  match compile(&source) {
    Ok(script) => Ok(script),
    Err(e) => {
      for line in e.lines() {
        print_error(&format!("{}: {}", file.display(), line));
      }
      bail!(
        "{} failed to compile with {} error(s)",
        file.display(),
        e.diagnostics().len()
      )
    }
  }
}
