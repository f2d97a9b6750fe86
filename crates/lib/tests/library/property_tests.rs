//! Property tests over the whole pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use deployer_lib::requirements::{Presets, RequirementsManager, ResolutionError, SolverRegistry};
use deployer_lib::runtime::progress;
use deployer_lib::{DeployerError, Items, analyze, compile, execute};
use proptest::prelude::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::{Recorder, drain, recording_context, steps_seen};

fn runtime() -> tokio::runtime::Runtime {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap()
}

/// Fragments that lex, so generated sources reach the parser and binder.
fn fragment() -> impl Strategy<Value = &'static str> {
  prop_oneof![
    Just("let"),
    Just("x"),
    Just("="),
    Just("=="),
    Just("!="),
    Just("!"),
    Just("("),
    Just(")"),
    Just("{"),
    Just("}"),
    Just(","),
    Just(";"),
    Just("if"),
    Just("else"),
    Just("true"),
    Just("1"),
    Just("\"a.wim\""),
    Just("@d"),
    Just("@w:wim"),
    Just("flash"),
    Just("applyImage"),
    Just("enableDualBoot"),
    Just("disk"),
  ]
}

/// `n` and a step index below it.
fn steps_and_failure() -> impl Strategy<Value = (usize, usize)> {
  (1usize..8).prop_flat_map(|n| (Just(n), 0..n))
}

proptest! {
  #[test]
  fn compile_never_panics_on_arbitrary_text(source in "\\PC{0,64}") {
    if let Ok(script) = compile(&source) {
      let _ = analyze(&script);
    }
  }

  #[test]
  fn compile_never_panics_on_token_soup(fragments in prop::collection::vec(fragment(), 0..32)) {
    let source = fragments.join(" ");
    match compile(&source) {
      Ok(script) => {
        let _ = analyze(&script);
      }
      Err(err) => prop_assert!(!err.diagnostics().is_empty()),
    }
  }

  #[test]
  fn each_external_is_required_once_in_first_use_order(keys in prop::collection::vec(0usize..6, 1..20)) {
    let source: String = keys.iter().map(|k| format!("enableDualBoot(@k{});\n", k)).collect();
    let script = compile(&source).unwrap();
    let requirements = analyze(&script).unwrap();

    let mut expected = Vec::new();
    for k in &keys {
      let key = format!("k{}", k);
      if !expected.contains(&key) {
        expected.push(key);
      }
    }
    let found: Vec<String> = requirements.into_iter().map(|r| r.key).collect();
    prop_assert_eq!(found, expected);
  }

  #[test]
  fn first_failing_step_stops_the_run((n, k) in steps_and_failure()) {
    let temp = TempDir::new().unwrap();
    let source: String = (0..n).map(|i| format!("enableDualBoot({});", i)).collect();
    let script = compile(&source).unwrap();
    let recorder = Arc::new(Recorder::failing_on(k as u32));
    let context = recording_context(recorder.clone(), temp.path());
    let (tx, mut rx) = progress::channel();

    let err = runtime()
      .block_on(execute(&script, &[], &context, tx, CancellationToken::new()))
      .unwrap_err();

    let DeployerError::StepFailed { index, .. } = &err else {
      panic!("expected step failure, got {err:?}");
    };
    prop_assert_eq!(*index, k);
    prop_assert_eq!(err.items().len(), k);

    let expected: Vec<String> = (0..=k).map(|i| format!("dual boot true on disk {}", i)).collect();
    prop_assert_eq!(recorder.calls(), expected);
    prop_assert_eq!(steps_seen(&drain(&mut rx)), (0..=k).collect::<Vec<_>>());
  }

  #[test]
  fn one_failing_solver_fails_the_whole_resolution((count, failing) in steps_and_failure()) {
    let source: String = (0..count).map(|i| format!("enableDualBoot(@k{});", i)).collect();
    let requirements = analyze(&compile(&source).unwrap()).unwrap();

    let presets = (0..count)
      .filter(|i| *i != failing)
      .fold(Presets::new(), |presets, i| presets.disk(format!("k{}", i), i as u32));
    let mut registry = SolverRegistry::new();
    presets.register_into(&mut registry);

    let err = runtime()
      .block_on(RequirementsManager::new(registry).resolve(&requirements, &HashSet::new(), &CancellationToken::new()))
      .unwrap_err();
    let ResolutionError::Solver { key, .. } = err else {
      panic!("expected solver failure, got {err:?}");
    };
    prop_assert_eq!(key, format!("k{}", failing));
  }
}
