//! `check` and `requirements` command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn check_reports_actions_and_requirements() {
  let env = TestEnv::with_script(
    r#"
      flash("img.wim", disk=@disk);
      injectDrivers(origin="img.wim");
    "#,
  );

  env
    .deployer_cmd()
    .arg("check")
    .arg(&env.script_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("compiled"))
    .stdout(predicate::str::contains("Actions: 2"))
    .stdout(predicate::str::contains("Requirements: 1"));
}

#[test]
fn check_prints_positioned_bind_error() {
  let env = TestEnv::with_script("flash(42)");

  env
    .deployer_cmd()
    .arg("check")
    .arg(&env.script_path)
    .assert()
    .code(1)
    .stderr(predicate::str::contains("bind error at 1:7"))
    .stderr(predicate::str::contains("failed to compile with"));
}

#[test]
fn check_prints_parse_error() {
  let env = TestEnv::with_script("a = 1;");

  env
    .deployer_cmd()
    .arg("check")
    .arg(&env.script_path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("parse error"))
    .stderr(predicate::str::contains("requires 'let'"));
}

#[test]
fn requirements_lists_keys_in_first_use_order() {
  let env = TestEnv::with_script(
    r#"
      applyImage(@os, @target);
      enableDualBoot(@target);
      flash("img", @spare);
    "#,
  );

  let output = env
    .deployer_cmd()
    .arg("requirements")
    .arg(&env.script_path)
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let stdout = String::from_utf8(output).unwrap();

  let os = stdout.find("@os (wim)").unwrap();
  let target = stdout.find("@target (disk)").unwrap();
  let spare = stdout.find("@spare (disk)").unwrap();
  assert!(os < target && target < spare, "{stdout}");
}

#[test]
fn requirements_as_json() {
  let env = TestEnv::with_script("enableDualBoot(@target);");

  let output = env
    .deployer_cmd()
    .args(["requirements", "-o", "json"])
    .arg(&env.script_path)
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(json, serde_json::json!([{ "key": "target", "kind": "disk" }]));
}

#[test]
fn requirements_of_script_without_externals() {
  let env = TestEnv::with_script(r##"displayMarkdown("# Hello");"##);

  env
    .deployer_cmd()
    .arg("requirements")
    .arg(&env.script_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("no external inputs"));
}
