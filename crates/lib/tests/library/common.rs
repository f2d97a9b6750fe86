//! Shared helpers for library integration tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deployer_lib::device::{
  AssetFetcher, Collaborators, DeviceAccess, DeviceError, Disk, DualBootAssistant, FetchError, ImageFlasher,
  InjectedDriver, LocalFileSystem, Volume, WindowsImageService,
};
use deployer_lib::runtime::{OperationContext, Progress, ProgressReceiver, RuntimeConfig, StepProgress};
use tokio_util::sync::CancellationToken;

/// Collaborators that record every call instead of touching a device.
#[derive(Debug, Default)]
pub struct Recorder {
  calls: Mutex<Vec<String>>,
  /// Dual-boot toggles on this disk fail.
  pub failing_disk: Option<u32>,
}

impl Recorder {
  pub fn failing_on(disk: u32) -> Self {
    Self {
      failing_disk: Some(disk),
      ..Self::default()
    }
  }

  fn log(&self, call: String) {
    self.calls.lock().unwrap().push(call);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl DeviceAccess for Recorder {
  async fn disk(&self, index: u32) -> Result<Disk, DeviceError> {
    self.log(format!("disk {}", index));
    Ok(Disk {
      index,
      path: format!("disk{}", index).into(),
    })
  }

  async fn windows_volume(&self) -> Result<Volume, DeviceError> {
    self.log("windows volume".to_string());
    Ok(Volume { root: "C:".into() })
  }
}

#[async_trait]
impl ImageFlasher for Recorder {
  async fn flash(
    &self,
    disk: &Disk,
    image: &Path,
    progress: &StepProgress,
    _cancel: &CancellationToken,
  ) -> Result<(), DeviceError> {
    progress.report(0.5);
    self.log(format!("flash {} onto disk {}", image.display(), disk.index));
    Ok(())
  }
}

#[async_trait]
impl WindowsImageService for Recorder {
  async fn inject_drivers(&self, origin: &Path, _volume: &Volume) -> Result<Vec<InjectedDriver>, DeviceError> {
    self.log(format!("inject {}", origin.display()));
    Ok(vec![InjectedDriver {
      name: "sample".into(),
      source: origin.join("sample.inf"),
      destination: "C:/Drivers/sample.inf".into(),
    }])
  }

  async fn apply_image(
    &self,
    wim: &Path,
    index: u32,
    _volume: &Volume,
    _progress: &StepProgress,
    _cancel: &CancellationToken,
  ) -> Result<(), DeviceError> {
    self.log(format!("apply {}#{}", wim.display(), index));
    Ok(())
  }
}

#[async_trait]
impl AssetFetcher for Recorder {
  async fn fetch(&self, url: &str, _progress: &StepProgress, _cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
    self.log(format!("fetch {}", url));
    Ok(Vec::new())
  }
}

struct RecordingDualBoot {
  recorder: Arc<Recorder>,
  disk: u32,
}

#[async_trait]
impl DualBootAssistant for RecordingDualBoot {
  async fn toggle_dual_boot(&self, enabled: bool) -> Result<(), DeviceError> {
    self.recorder.log(format!("dual boot {} on disk {}", enabled, self.disk));
    if self.recorder.failing_disk == Some(self.disk) {
      return Err(DeviceError::not_found(format!("disk {}", self.disk)));
    }
    Ok(())
  }
}

pub fn collaborators(recorder: Arc<Recorder>) -> Collaborators {
  let for_dual_boot = recorder.clone();
  Collaborators {
    device: recorder.clone(),
    flasher: recorder.clone(),
    image_service: recorder.clone(),
    dual_boot: Arc::new(move |disk: u32| -> Box<dyn DualBootAssistant> {
      Box::new(RecordingDualBoot {
        recorder: for_dual_boot.clone(),
        disk,
      })
    }),
    file_system: Arc::new(LocalFileSystem),
    fetcher: recorder,
  }
}

pub fn recording_context(recorder: Arc<Recorder>, artifacts: &Path) -> OperationContext {
  OperationContext::new(
    collaborators(recorder),
    RuntimeConfig {
      artifacts_dir: artifacts.to_path_buf(),
    },
  )
}

/// Every notification still queued on `rx`.
pub fn drain(rx: &mut ProgressReceiver) -> Vec<Progress> {
  let mut out = Vec::new();
  while let Ok(progress) = rx.try_recv() {
    out.push(progress);
  }
  out
}

/// Distinct step indices in the order they were first reported.
pub fn steps_seen(progress: &[Progress]) -> Vec<usize> {
  let mut steps: Vec<usize> = Vec::new();
  for p in progress {
    if steps.last() != Some(&p.step) {
      steps.push(p.step);
    }
  }
  steps
}
