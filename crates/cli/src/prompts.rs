//! Terminal prompts: run confirmation and interactive requirement solvers.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use deployer_lib::RequirementKind;
use deployer_lib::requirements::{
  Requirement, RequirementRequest, RequirementResponse, RequirementSolver, SolverError, SolverRegistry,
};

use crate::output::print_warning;

const MAX_ATTEMPTS: usize = 3;

pub fn confirm(message: &str, force: bool) -> Result<bool> {
  if force {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("Cannot prompt for confirmation in non-interactive mode. Use --yes to proceed.");
  }

  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;

  Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Parse `path[#index]`; the image index defaults to 1.
pub fn parse_wim_location(input: &str) -> Result<(PathBuf, u32), String> {
  let (path, index) = match input.rsplit_once('#') {
    Some((path, index)) => {
      let index: u32 = index
        .trim()
        .parse()
        .map_err(|_| format!("invalid image index '{}'", index))?;
      (path, index)
    }
    None => (input, 1),
  };
  let path = path.trim();
  if path.is_empty() {
    return Err("image path is empty".to_string());
  }
  if index == 0 {
    return Err("image indices start at 1".to_string());
  }
  Ok((PathBuf::from(path), index))
}

/// Turn one line typed by the operator into a response for `request`.
pub fn parse_answer(request: &RequirementRequest, input: &str) -> Result<RequirementResponse, String> {
  let key = request.key().to_string();
  match request {
    RequirementRequest::Disk { .. } => {
      let index = input
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a disk number", input.trim()))?;
      Ok(RequirementResponse::Disk { key, index })
    }
    RequirementRequest::WimFile { .. } => {
      let (path, index) = parse_wim_location(input)?;
      Ok(RequirementResponse::WimFile { key, path, index })
    }
  }
}

fn question(request: &RequirementRequest) -> String {
  match request {
    RequirementRequest::Disk { key } => format!("Disk number for @{}: ", key),
    RequirementRequest::WimFile { key } => format!("Windows image for @{} (path[#index]): ", key),
  }
}

/// Ask on the terminal until a valid answer, an empty line, or too many tries.
fn ask(request: &RequirementRequest) -> Result<RequirementResponse, SolverError> {
  if !io::stdin().is_terminal() {
    return Err(SolverError::Failed(format!(
      "cannot prompt for '@{}' in non-interactive mode; pass it with --disk or --wim",
      request.key()
    )));
  }

  for _ in 0..MAX_ATTEMPTS {
    write!(io::stderr(), "{}", question(request))?;
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim().is_empty() {
      return Err(SolverError::Declined);
    }

    match parse_answer(request, &input) {
      Ok(response) => return Ok(response),
      Err(message) => print_warning(&message),
    }
  }

  Err(SolverError::Failed(format!(
    "no valid answer for '@{}' after {} attempts",
    request.key(),
    MAX_ATTEMPTS
  )))
}

/// Solver that asks the operator. Prompts never interleave: solvers share one
/// console turn.
pub struct PromptSolver {
  console: Arc<Mutex<()>>,
}

#[async_trait]
impl RequirementSolver for PromptSolver {
  async fn solve(&self, request: RequirementRequest) -> Result<RequirementResponse, SolverError> {
    let _turn = self.console.lock().await;
    tokio::task::spawn_blocking(move || ask(&request))
      .await
      .map_err(|e| SolverError::Failed(e.to_string()))?
  }
}

/// Register prompting solvers for every requirement kind.
pub fn register_prompts(registry: &mut SolverRegistry) {
  let console = Arc::new(Mutex::new(()));
  for kind in [RequirementKind::Disk, RequirementKind::WimFile] {
    let console = console.clone();
    registry.register(kind, move |_: &Requirement| -> Box<dyn RequirementSolver> {
      Box::new(PromptSolver {
        console: console.clone(),
      })
    });
  }
}
