//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the script, the
/// loopback device, and the application data directory.
pub struct TestEnv {
  pub temp: TempDir,
  pub script_path: PathBuf,
}

impl TestEnv {
  /// Create an environment whose script has `content`.
  pub fn with_script(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let script_path = temp.path().join("deploy.dpl");
    std::fs::write(&script_path, content).unwrap();
    Self { temp, script_path }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Data path standing in for the application directory.
  pub fn data_path(&self) -> PathBuf {
    let p = self.temp.path().join("data");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Loopback device path; created by [`TestEnv::init_device`].
  pub fn device_path(&self) -> PathBuf {
    self.temp.path().join("device")
  }

  /// Run `deployer init` for a device with `disks` disks.
  pub fn init_device(&self, disks: u32) {
    self
      .deployer_cmd()
      .arg("init")
      .arg(self.device_path())
      .arg("--disks")
      .arg(disks.to_string())
      .assert()
      .success();
  }

  /// Get a pre-configured Command for the deployer binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `DEPLOYER_ROOT`: Isolated data path
  /// - `DEPLOYER_ARTIFACTS`: Isolated artifacts path
  pub fn deployer_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("deployer");
    cmd.env("DEPLOYER_ROOT", self.data_path());
    cmd.env("DEPLOYER_ARTIFACTS", self.data_path().join("artifacts"));
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// `deployer run` on this environment's script and device, never prompting.
  pub fn run_cmd(&self) -> Command {
    let mut cmd = self.deployer_cmd();
    cmd
      .arg("run")
      .arg(&self.script_path)
      .arg("--device")
      .arg(self.device_path())
      .arg("--non-interactive");
    cmd
  }
}
