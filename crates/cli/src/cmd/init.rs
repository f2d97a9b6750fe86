//! Implementation of the `deployer init` command.
//!
//! Creates a loopback device: a directory with empty disk images and an empty
//! Windows volume that scripts can run against.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use deployer_lib::device::LoopbackDevice;

use crate::output::symbols;

pub fn cmd_init(path: &Path, disks: u32) -> Result<()> {
  let device =
    LoopbackDevice::create(path, disks).with_context(|| format!("Failed to create device at {}", path.display()))?;
  let root = dunce::canonicalize(device.root()).unwrap_or_else(|_| device.root().to_path_buf());

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized loopback device!".green().bold()
  );
  println!();
  println!("  {} Device: {}", symbols::INFO.cyan(), root.display());
  println!("  {} Disks:  {}", symbols::INFO.cyan(), disks);
  println!();
  println!("{}", "Next steps:".bold());
  println!(
    "  Run: {}",
    format!("deployer run <script> --device {}", root.display()).cyan()
  );

  Ok(())
}
