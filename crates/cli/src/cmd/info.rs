//! Implementation of the `deployer info` command.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use deployer_lib::device::{DeviceLock, DeviceLockError, LoopbackDevice};
use deployer_lib::paths;

use crate::output::{print_info, print_stat, truncate_hash};

pub fn cmd_info(device: Option<&Path>) -> Result<()> {
  println!("deployer v{}", env!("CARGO_PKG_VERSION"));
  print_stat("Data", &paths::data_dir().display().to_string());
  print_stat("Artifacts", &paths::artifacts_dir().display().to_string());

  let Some(root) = device else {
    return Ok(());
  };

  let device = LoopbackDevice::open(root).with_context(|| format!("Failed to open device {}", root.display()))?;
  println!();
  println!("Device: {}", device.root().display());
  print_stat("Lock", &lock_status(device.root())?);

  for index in device.disks()? {
    let dual_boot = match device.dual_boot_state(index) {
      Some(true) => "dual boot enabled",
      Some(false) => "dual boot disabled",
      None => "dual boot untouched",
    };
    print_stat(&format!("Disk {}", index), dual_boot);
  }

  match device.applied_image() {
    Some(image) => print_stat(
      "Applied image",
      &format!(
        "{}#{} ({})",
        image.source.display(),
        image.index,
        truncate_hash(&image.sha256)
      ),
    ),
    None => print_info("No image applied to the Windows volume"),
  }

  Ok(())
}

fn lock_status(root: &Path) -> Result<String> {
  match DeviceLock::acquire(root, "deployer info") {
    Ok(_) => Ok("free".to_string()),
    Err(DeviceLockError::Busy {
      command,
      pid,
      started_at_unix,
      ..
    }) => {
      let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
      let held_for = Duration::from_secs(now.saturating_sub(started_at_unix));
      Ok(format!(
        "held by {} (PID {}) for {}",
        command,
        pid,
        humantime::format_duration(held_for)
      ))
    }
    Err(DeviceLockError::BusyUnknown { .. }) => Ok("held by another process".to_string()),
    Err(e) => Err(e.into()),
  }
}
