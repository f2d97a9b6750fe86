//! `run` command integration tests against a loopback device.

use predicates::prelude::*;

use deployer_lib::device::DeviceLock;

use super::common::TestEnv;

fn script_path(path: &std::path::Path) -> String {
  path.display().to_string().replace('\\', "\\\\")
}

#[test]
fn run_toggles_dual_boot() {
  let env = TestEnv::with_script(
    r#"
      enableDualBoot(@target);
      displayMarkdown("All done");
    "#,
  );
  env.init_device(2);

  env
    .run_cmd()
    .args(["--disk", "target=1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Enabled dual boot on disk 1"))
    .stdout(predicate::str::contains("All done"))
    .stdout(predicate::str::contains("Deployment complete"))
    .stderr(predicate::str::contains("Step 1/2"))
    .stderr(predicate::str::contains("Completed 2 step(s)"));

  let state = std::fs::read_to_string(env.device_path().join("disk1.dualboot")).unwrap();
  assert_eq!(state, "enabled");
}

#[test]
fn run_flashes_and_injects_drivers() {
  let env = TestEnv::with_script("");
  let image = env.write_file("images/install.wim", "windows image");
  env.write_file("drivers/gpu.inf", "gpu");
  let drivers = env.temp.path().join("drivers");
  std::fs::write(
    &env.script_path,
    format!(
      r#"
        flash("{image}", disk=@disk);
        applyImage(@os, @disk);
        injectDrivers(origin="{drivers}");
      "#,
      image = script_path(&image),
      drivers = script_path(&drivers),
    ),
  )
  .unwrap();
  env.init_device(1);

  env
    .run_cmd()
    .args(["--disk", "disk=0"])
    .arg("--wim")
    .arg(format!("os={}#2", image.display()))
    .assert()
    .success()
    .stdout(predicate::str::contains("Flashed"))
    .stdout(predicate::str::contains("Applied image 2"))
    .stdout(predicate::str::contains("Injected 1 driver(s)"));

  let device = env.device_path();
  assert_eq!(std::fs::read_to_string(device.join("disk0.img")).unwrap(), "windows image");
  assert!(device.join("windows").join("Drivers").join("gpu.inf").exists());

  let metadata_dir = env.data_path().join("artifacts").join("Injected Drivers");
  let names: Vec<String> = std::fs::read_dir(metadata_dir)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(names.len(), 1);
  assert!(names[0].starts_with("drivers_") && names[0].ends_with("Info.json"));
}

#[test]
fn run_without_value_in_non_interactive_mode_fails() {
  let env = TestEnv::with_script("enableDualBoot(@target);");
  env.init_device(1);

  env
    .run_cmd()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("No value for @target (disk)"));

  assert!(!env.device_path().join("disk0.dualboot").exists());
}

#[test]
fn run_stops_at_first_failing_step() {
  let env = TestEnv::with_script(
    r#"
      displayMarkdown("first");
      enableDualBoot(7);
      enableDualBoot(0);
    "#,
  );
  env.init_device(1);

  env
    .run_cmd()
    .assert()
    .code(1)
    .stdout(predicate::str::contains("first"))
    .stderr(predicate::str::contains("step 2 (Enabling dual boot) failed"))
    .stderr(predicate::str::contains("Deployment did not complete"));

  assert!(!env.device_path().join("disk0.dualboot").exists());
}

#[test]
fn run_warns_about_unused_values() {
  let env = TestEnv::with_script(r#"displayMarkdown("hi");"#);
  env.init_device(1);

  env
    .run_cmd()
    .args(["--disk", "spare=0"])
    .assert()
    .success()
    .stderr(predicate::str::contains("'@spare' is not used"));
}

#[test]
fn run_with_wrong_kind_is_rejected() {
  let env = TestEnv::with_script("enableDualBoot(@target);");
  env.init_device(1);

  env
    .run_cmd()
    .args(["--wim", "target=install.wim"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("value for '@target' is wim but the script needs disk"));
}

#[test]
fn run_refuses_locked_device() {
  let env = TestEnv::with_script(r#"displayMarkdown("hi");"#);
  env.init_device(1);
  let device = dunce::canonicalize(env.device_path()).unwrap();
  let _held = DeviceLock::acquire(&device, "test holder").unwrap();

  env
    .run_cmd()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("device is in use"))
    .stderr(predicate::str::contains("test holder"));
}

#[test]
fn run_on_missing_device_fails() {
  let env = TestEnv::with_script(r#"displayMarkdown("hi");"#);

  env
    .run_cmd()
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Device directory not found"));
}
