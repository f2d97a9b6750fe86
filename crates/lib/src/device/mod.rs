//! Collaborators the runtime drives, and a file-backed device implementing them.
//!
//! The runtime only ever talks to the traits in this module. Real hardware
//! support lives outside this crate; [`loopback`] provides a directory-backed
//! device so whole scripts can run end to end.

pub mod fetch;
pub mod fs;
pub mod lock;
pub mod loopback;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::runtime::StepProgress;

pub use fetch::{AssetFetcher, FetchError, HttpFetcher};
pub use fs::{FileSystemOperations, LocalFileSystem};
pub use lock::{DeviceLock, DeviceLockError};
pub use loopback::LoopbackDevice;

/// A disk of the target device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
  pub index: u32,
  pub path: PathBuf,
}

/// The Windows volume of the target device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
  pub root: PathBuf,
}

/// One driver placed into a Windows volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedDriver {
  pub name: String,
  pub source: PathBuf,
  pub destination: PathBuf,
}

#[derive(Debug, Error)]
pub enum DeviceError {
  /// A disk, volume, image or folder the action needs does not exist.
  #[error("{what} not found")]
  NotFound { what: String },

  /// The operation observed the cancellation token.
  #[error("operation cancelled")]
  Cancelled,

  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl DeviceError {
  pub fn not_found(what: impl Into<String>) -> Self {
    DeviceError::NotFound { what: what.into() }
  }

  pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
    DeviceError::Io {
      path: path.as_ref().to_path_buf(),
      source,
    }
  }
}

#[async_trait]
pub trait DeviceAccess: Send + Sync {
  async fn disk(&self, index: u32) -> Result<Disk, DeviceError>;
  async fn windows_volume(&self) -> Result<Volume, DeviceError>;
}

#[async_trait]
pub trait ImageFlasher: Send + Sync {
  async fn flash(
    &self,
    disk: &Disk,
    image: &Path,
    progress: &StepProgress,
    cancel: &CancellationToken,
  ) -> Result<(), DeviceError>;
}

#[async_trait]
pub trait WindowsImageService: Send + Sync {
  async fn inject_drivers(&self, origin: &Path, volume: &Volume) -> Result<Vec<InjectedDriver>, DeviceError>;

  /// Apply image `index` of `wim` onto `volume`.
  async fn apply_image(
    &self,
    wim: &Path,
    index: u32,
    volume: &Volume,
    progress: &StepProgress,
    cancel: &CancellationToken,
  ) -> Result<(), DeviceError>;
}

#[async_trait]
pub trait DualBootAssistant: Send + Sync {
  async fn toggle_dual_boot(&self, enabled: bool) -> Result<(), DeviceError>;
}

/// Builds the dual-boot assistant for a disk index.
pub type DualBootFactory = Arc<dyn Fn(u32) -> Box<dyn DualBootAssistant> + Send + Sync>;

/// Everything an operation context needs to reach the target device.
#[derive(Clone)]
pub struct Collaborators {
  pub device: Arc<dyn DeviceAccess>,
  pub flasher: Arc<dyn ImageFlasher>,
  pub image_service: Arc<dyn WindowsImageService>,
  pub dual_boot: DualBootFactory,
  pub file_system: Arc<dyn FileSystemOperations>,
  pub fetcher: Arc<dyn AssetFetcher>,
}

impl std::fmt::Debug for Collaborators {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Collaborators").finish_non_exhaustive()
  }
}
