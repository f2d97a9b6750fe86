//! End-to-end runs through compile, analyze, resolve and execute.

use std::collections::HashSet;
use std::sync::Arc;

use deployer_lib::device::{HttpFetcher, LoopbackDevice};
use deployer_lib::requirements::{Presets, RequirementsManager, ResolutionError, SolverRegistry, missing_requirements};
use deployer_lib::runtime::{OperationContext, RuntimeConfig, progress};
use deployer_lib::syntax::ValueKind;
use deployer_lib::{
  Assignment, CompilerError, DeployerError, Items, Requirement, RequirementKind, analyze, compile, execute,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::{Recorder, drain, recording_context, steps_seen};

fn script_path(path: &std::path::Path) -> String {
  path.display().to_string().replace('\\', "\\\\")
}

#[tokio::test]
async fn flash_then_inject_runs_in_order() {
  let temp = TempDir::new().unwrap();
  let source = r#"flash("img.wim", disk=@disk); injectDrivers(origin="img.wim");"#;

  let script = compile(source).unwrap();
  let requirements = analyze(&script).unwrap();
  assert_eq!(requirements, vec![Requirement::new("disk", RequirementKind::Disk)]);

  let mut registry = SolverRegistry::new();
  Presets::new().disk("disk", 1).register_into(&mut registry);
  let assignments = RequirementsManager::new(registry)
    .resolve(&requirements, &HashSet::new(), &CancellationToken::new())
    .await
    .unwrap();
  assert!(missing_requirements(&requirements, &assignments).is_empty());

  let recorder = Arc::new(Recorder::default());
  let context = recording_context(recorder.clone(), temp.path());
  let (tx, mut rx) = progress::channel();
  let success = execute(&script, &assignments, &context, tx, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(
    success.items(),
    ["Flashed img.wim onto disk 1", "Injected 1 driver(s) from img.wim"]
  );
  assert_eq!(
    recorder.calls(),
    vec!["disk 1", "flash img.wim onto disk 1", "windows volume", "inject img.wim"]
  );
  assert_eq!(steps_seen(&drain(&mut rx)), vec![0, 1, 2]);

  let metadata: Vec<String> = std::fs::read_dir(temp.path().join("Injected Drivers"))
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(metadata.len(), 1);
  assert!(metadata[0].starts_with("img_") && metadata[0].ends_with("Info.json"), "{metadata:?}");
}

#[test]
fn number_argument_for_text_parameter_is_a_bind_error() {
  let err = compile("flash(42)").unwrap_err();
  let CompilerError::Bind(diagnostics) = &err else {
    panic!("expected bind error, got {err:?}");
  };
  assert!(diagnostics[0].message.contains("argument 0"), "{}", diagnostics[0]);
  assert_eq!(diagnostics[0].position.column, 7);
}

#[test]
fn annotated_and_inferred_externals_are_reported_once() {
  let script = compile(
    r#"
      let target = @disk;
      if target == 1 {
        applyImage(@install, target);
      } else {
        applyImage(image=@install:wim, disk=@disk);
      }
    "#,
  )
  .unwrap();
  let requirements = analyze(&script).unwrap();
  assert_eq!(
    requirements,
    vec![
      Requirement::new("disk", RequirementKind::Disk),
      Requirement::new("install", RequirementKind::WimFile),
    ]
  );
  assert_eq!(requirements[1].kind.value_kind(), ValueKind::Wim);
}

#[tokio::test]
async fn failed_resolution_stops_before_execution() {
  let script = compile("enableDualBoot(@a); enableDualBoot(@b);").unwrap();
  let requirements = analyze(&script).unwrap();

  let mut registry = SolverRegistry::new();
  Presets::new().disk("a", 0).register_into(&mut registry);
  let err = RequirementsManager::new(registry)
    .resolve(&requirements, &HashSet::new(), &CancellationToken::new())
    .await
    .unwrap_err();
  let ResolutionError::Solver { key, .. } = &err else {
    panic!("expected solver failure, got {err:?}");
  };
  assert_eq!(key, "b");
}

#[tokio::test]
async fn already_known_keys_are_not_resolved_again() {
  let script = compile("enableDualBoot(@a); enableDualBoot(@b);").unwrap();
  let requirements = analyze(&script).unwrap();

  let mut registry = SolverRegistry::new();
  Presets::new().disk("b", 3).register_into(&mut registry);
  let known = HashSet::from(["a".to_string()]);
  let resolved = RequirementsManager::new(registry)
    .resolve(&requirements, &known, &CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(resolved, vec![Assignment::disk("b", 3)]);
}

#[tokio::test]
async fn loopback_device_runs_a_whole_script() {
  let temp = TempDir::new().unwrap();
  let image = temp.path().join("install.wim");
  std::fs::write(&image, vec![7u8; 10_000]).unwrap();
  let drivers = temp.path().join("drivers");
  std::fs::create_dir_all(drivers.join("net")).unwrap();
  std::fs::write(drivers.join("net").join("nic.INF"), "nic").unwrap();
  std::fs::write(drivers.join("gpu.inf"), "gpu").unwrap();
  std::fs::write(drivers.join("readme.txt"), "skip").unwrap();

  let source = format!(
    r##"
      let image = "{image}";
      flash(image, @target);
      applyImage(image, @target);
      injectDrivers("{drivers}");
      enableDualBoot(@target);
      displayMarkdown("# Finished");
    "##,
    image = script_path(&image),
    drivers = script_path(&drivers),
  );
  let script = compile(&source).unwrap();
  let requirements = analyze(&script).unwrap();
  assert_eq!(requirements, vec![Requirement::new("target", RequirementKind::Disk)]);

  let device_root = temp.path().join("device");
  let device = LoopbackDevice::create(&device_root, 2).unwrap().with_chunk_size(1024);
  let context = OperationContext::new(
    device.into_collaborators(Arc::new(HttpFetcher::default())),
    RuntimeConfig {
      artifacts_dir: temp.path().join("artifacts"),
    },
  );

  let presets = Presets::new().disk("target", 1);
  let (tx, mut rx) = progress::channel();
  let success = execute(&script, &presets.assignments(), &context, tx, CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(success.items().len(), 5);
  assert_eq!(success.items()[4], "# Finished");

  assert_eq!(std::fs::read(device_root.join("disk1.img")).unwrap().len(), 10_000);
  assert!(device_root.join("disk1.img.sha256").exists());
  assert!(device_root.join("windows").join("install.wim").exists());
  assert!(device_root.join("windows").join("applied-image.json").exists());
  assert!(device_root.join("windows").join("Drivers").join("gpu.inf").exists());
  assert!(device_root.join("windows").join("Drivers").join("nic.INF").exists());
  assert_eq!(LoopbackDevice::open(&device_root).unwrap().dual_boot_state(1), Some(true));

  let seen = drain(&mut rx);
  assert_eq!(steps_seen(&seen), vec![0, 1, 2, 3, 4, 5]);
  let last = seen.last().unwrap();
  assert_eq!((last.step, last.total, last.fraction), (5, 5, 1.0));
  assert!(seen.iter().all(|p| (0.0..=1.0).contains(&p.fraction)));
}

#[tokio::test]
async fn missing_assignment_is_reported_by_execute() {
  let temp = TempDir::new().unwrap();
  let script = compile("enableDualBoot(@disk); disableDualBoot(@other);").unwrap();
  let context = recording_context(Arc::new(Recorder::default()), temp.path());
  let (tx, _rx) = progress::channel();
  let err = execute(
    &script,
    &[Assignment::disk("disk", 0)],
    &context,
    tx,
    CancellationToken::new(),
  )
  .await
  .unwrap_err();
  let DeployerError::MissingAssignments { missing } = err else {
    panic!("expected missing assignments, got {err:?}");
  };
  assert_eq!(missing, vec![Requirement::new("other", RequirementKind::Disk)]);
}
