//! `init` and `info` command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn init_creates_disks_and_volume() {
  let env = TestEnv::with_script("");

  env
    .deployer_cmd()
    .arg("init")
    .arg(env.device_path())
    .args(["--disks", "3"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Initialized loopback device"));

  let device = env.device_path();
  for index in 0..3 {
    assert!(device.join(format!("disk{}.img", index)).exists());
  }
  assert!(!device.join("disk3.img").exists());
  assert!(device.join("windows").is_dir());
}

#[test]
fn init_keeps_existing_disk_contents() {
  let env = TestEnv::with_script("");
  env.init_device(1);
  std::fs::write(env.device_path().join("disk0.img"), "kept").unwrap();

  env.init_device(2);

  assert_eq!(std::fs::read_to_string(env.device_path().join("disk0.img")).unwrap(), "kept");
  assert!(env.device_path().join("disk1.img").exists());
}

#[test]
fn info_shows_device_state() {
  let env = TestEnv::with_script("enableDualBoot(1);");
  env.init_device(2);
  env.run_cmd().assert().success();

  env
    .deployer_cmd()
    .arg("info")
    .arg("--device")
    .arg(env.device_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Lock: free"))
    .stdout(predicate::str::contains("Disk 0: dual boot untouched"))
    .stdout(predicate::str::contains("Disk 1: dual boot enabled"))
    .stdout(predicate::str::contains("No image applied"));
}

#[test]
fn info_on_missing_device_fails() {
  let env = TestEnv::with_script("");

  env
    .deployer_cmd()
    .arg("info")
    .arg("--device")
    .arg(env.device_path())
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to open device"));
}
