//! Implementation of the `deployer run` command.
//!
//! Compiles a script, resolves its requirements from flags and prompts, then
//! executes it against a loopback device while holding the device lock.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deployer_lib::device::{DeviceLock, HttpFetcher, LoopbackDevice};
use deployer_lib::requirements::{Presets, RequirementsManager, SolverRegistry, missing_requirements};
use deployer_lib::runtime::{OperationContext, RuntimeConfig, progress};
use deployer_lib::{Assignment, Requirement, Script, analyze, execute};

use super::load_script;
use crate::output::{print_info, print_outcome, print_progress, print_warning};
use crate::prompts::{confirm, parse_wim_location, register_prompts};

#[derive(Args, Debug)]
pub struct RunArgs {
  /// Path to the deployment script
  pub file: PathBuf,

  /// Loopback device directory to deploy to
  #[arg(long)]
  pub device: PathBuf,

  /// Disk for a requirement
  #[arg(long = "disk", value_name = "KEY=N", value_parser = parse_disk_flag)]
  pub disks: Vec<(String, u32)>,

  /// Windows image for a requirement
  #[arg(long = "wim", value_name = "KEY=PATH[#INDEX]", value_parser = parse_wim_flag)]
  pub wims: Vec<(String, PathBuf, u32)>,

  /// Never prompt; fail when a requirement has no value
  #[arg(long)]
  pub non_interactive: bool,

  /// Skip the confirmation prompt
  #[arg(short, long)]
  pub yes: bool,

  /// Directory for run artifacts (driver metadata, downloaded repositories)
  #[arg(long)]
  pub artifacts: Option<PathBuf>,
}

impl RunArgs {
  fn presets(&self) -> Presets {
    let presets = self
      .disks
      .iter()
      .fold(Presets::new(), |presets, (key, index)| presets.disk(key, *index));
    self
      .wims
      .iter()
      .fold(presets, |presets, (key, path, index)| presets.wim(key, path, *index))
  }
}

fn split_flag(input: &str) -> Result<(String, &str), String> {
  let (key, value) = input
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", input))?;
  let key = key.trim().trim_start_matches('@');
  if key.is_empty() {
    return Err("requirement key is empty".to_string());
  }
  Ok((key.to_string(), value))
}

/// Parse `key=N`.
pub fn parse_disk_flag(input: &str) -> Result<(String, u32), String> {
  let (key, value) = split_flag(input)?;
  let index = value
    .trim()
    .parse()
    .map_err(|_| format!("'{}' is not a disk number", value))?;
  Ok((key, index))
}

/// Parse `key=path[#index]`.
pub fn parse_wim_flag(input: &str) -> Result<(String, PathBuf, u32), String> {
  let (key, value) = split_flag(input)?;
  let (path, index) = parse_wim_location(value)?;
  Ok((key, path, index))
}

/// How long a finished run waits for background work such as a prompt still
/// blocked on stdin.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Run `body` on a fresh runtime, then shut it down without waiting on
/// blocking tasks, whether `body` succeeded or not.
fn with_runtime<T>(body: impl FnOnce(&tokio::runtime::Runtime) -> Result<T>) -> Result<T> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = body(&rt);
  rt.shutdown_timeout(SHUTDOWN_GRACE);
  result
}

pub fn cmd_run(args: RunArgs) -> Result<()> {
  let script = load_script(&args.file)?;
  let requirements = analyze(&script).with_context(|| format!("Failed to analyze {}", args.file.display()))?;

  let assignments = args.presets().assignments();
  for assignment in &assignments {
    if !requirements.iter().any(|r| r.key == assignment.key) {
      print_warning(&format!("'@{}' is not used by {}", assignment.key, args.file.display()));
    }
  }

  let missing = missing_requirements(&requirements, &assignments);
  if args.non_interactive && !missing.is_empty() {
    let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
    bail!("No value for {}; pass it with --disk or --wim", missing.join(", "));
  }

  let root = dunce::canonicalize(&args.device)
    .with_context(|| format!("Device directory not found: {}", args.device.display()))?;
  let _lock = DeviceLock::acquire(&root, "deployer run")?;
  let device = LoopbackDevice::open(&root).with_context(|| format!("Failed to open device {}", root.display()))?;

  let config = match &args.artifacts {
    Some(dir) => RuntimeConfig {
      artifacts_dir: dir.clone(),
    },
    None => RuntimeConfig::default(),
  };
  let context = OperationContext::new(device.into_collaborators(Arc::new(HttpFetcher::default())), config);

  with_runtime(|rt| drive(rt, &args, script, requirements, assignments, &root, &context))
}

fn drive(
  rt: &tokio::runtime::Runtime,
  args: &RunArgs,
  script: Script,
  requirements: Vec<Requirement>,
  mut assignments: Vec<Assignment>,
  root: &Path,
  context: &OperationContext,
) -> Result<()> {
  let missing = missing_requirements(&requirements, &assignments);
  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling");
      on_interrupt.cancel();
    }
  });

  if !missing.is_empty() {
    let known: HashSet<String> = assignments.iter().map(|a| a.key.clone()).collect();
    let mut registry = SolverRegistry::new();
    register_prompts(&mut registry);
    let resolved = rt
      .block_on(RequirementsManager::new(registry).resolve(&requirements, &known, &cancel))
      .context("Failed to resolve requirements")?;
    assignments.extend(resolved);
  }

  let question = format!("Run {} against {}?", args.file.display(), root.display());
  if !confirm(&question, args.yes || args.non_interactive)? {
    print_info("Aborted");
    return Ok(());
  }

  info!(script = %args.file.display(), device = %root.display(), "starting run");
  let (tx, mut rx) = progress::channel();
  let printer = rt.spawn(async move {
    while let Some(progress) = rx.recv().await {
      print_progress(&progress);
    }
  });

  let started = Instant::now();
  let outcome = rt.block_on(execute(&script, &assignments, context, tx, cancel));
  let _ = rt.block_on(printer);

  print_outcome(&outcome, started.elapsed());
  if outcome.is_err() {
    bail!("Deployment did not complete");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disk_flag_splits_key_and_index() {
    assert_eq!(parse_disk_flag("target=2"), Ok(("target".to_string(), 2)));
    assert_eq!(parse_disk_flag("@target=0"), Ok(("target".to_string(), 0)));
    assert!(parse_disk_flag("target").is_err());
    assert!(parse_disk_flag("=1").is_err());
    assert!(parse_disk_flag("target=-1").is_err());
  }

  #[test]
  fn wim_flag_accepts_optional_index() {
    assert_eq!(
      parse_wim_flag("os=install.wim"),
      Ok(("os".to_string(), PathBuf::from("install.wim"), 1))
    );
    assert_eq!(
      parse_wim_flag("os=install.wim#3"),
      Ok(("os".to_string(), PathBuf::from("install.wim"), 3))
    );
  }

  #[test]
  fn failed_run_does_not_wait_on_blocking_work() {
    let started = Instant::now();
    let result: Result<()> = with_runtime(|rt| {
      rt.spawn_blocking(|| std::thread::sleep(Duration::from_secs(5)));
      bail!("Failed to resolve requirements")
    });
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
  }

  #[test]
  fn presets_cover_both_flag_kinds() {
    let args = RunArgs {
      file: "deploy.txt".into(),
      device: "device".into(),
      disks: vec![("target".into(), 1)],
      wims: vec![("os".into(), "install.wim".into(), 2)],
      non_interactive: true,
      yes: false,
      artifacts: None,
    };
    let keys: Vec<String> = args.presets().assignments().into_iter().map(|a| a.key).collect();
    assert_eq!(keys, vec!["os", "target"]);
  }
}
