//! A directory standing in for a physical device.
//!
//! Layout of a loopback root:
//!
//! ```text
//! <root>/
//!   disk0.img            disk 0; flashing overwrites it
//!   disk0.img.sha256     digest of the last image flashed onto disk 0
//!   disk0.dualboot       "enabled" or "disabled"
//!   windows/             the Windows volume
//!     Drivers/           injected *.inf files
//!     applied-image.json record of the last applied WIM
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{
  AssetFetcher, Collaborators, DeviceAccess, DeviceError, Disk, DualBootAssistant, ImageFlasher, InjectedDriver,
  LocalFileSystem, Volume, WindowsImageService,
};
use crate::runtime::StepProgress;

const WINDOWS_DIR: &str = "windows";
const DRIVERS_DIR: &str = "Drivers";
const APPLIED_IMAGE_FILE: &str = "applied-image.json";

/// Default copy chunk size for flashing and image application.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Record written when a WIM is applied to the Windows volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedImage {
  pub source: PathBuf,
  pub index: u32,
  pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct LoopbackDevice {
  root: PathBuf,
  chunk_size: usize,
}

impl LoopbackDevice {
  /// Open an existing loopback root.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, DeviceError> {
    let root = root.into();
    if !root.is_dir() {
      return Err(DeviceError::not_found(format!("device directory {}", root.display())));
    }
    Ok(Self {
      root,
      chunk_size: DEFAULT_CHUNK_SIZE,
    })
  }

  /// Create a loopback root with `disks` empty disks and an empty Windows volume.
  pub fn create(root: impl Into<PathBuf>, disks: u32) -> Result<Self, DeviceError> {
    let root = root.into();
    let windows = root.join(WINDOWS_DIR);
    std::fs::create_dir_all(&windows).map_err(|e| DeviceError::io(&windows, e))?;
    for index in 0..disks {
      let path = disk_path(&root, index);
      if !path.exists() {
        std::fs::File::create(&path).map_err(|e| DeviceError::io(&path, e))?;
      }
    }
    info!(root = %root.display(), disks, "created loopback device");
    Self::open(root)
  }

  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size.max(1);
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Indices of the disks present, ascending.
  pub fn disks(&self) -> Result<Vec<u32>, DeviceError> {
    let entries = std::fs::read_dir(&self.root).map_err(|e| DeviceError::io(&self.root, e))?;
    let mut disks: Vec<u32> = entries
      .filter_map(Result::ok)
      .filter_map(|entry| {
        let name = entry.file_name();
        let name = name.to_str()?;
        name.strip_prefix("disk")?.strip_suffix(".img")?.parse().ok()
      })
      .collect();
    disks.sort_unstable();
    Ok(disks)
  }

  /// Dual-boot state of a disk, `None` when never toggled.
  pub fn dual_boot_state(&self, index: u32) -> Option<bool> {
    let state = std::fs::read_to_string(self.root.join(format!("disk{}.dualboot", index))).ok()?;
    Some(state.trim() == "enabled")
  }

  /// The last image applied to the Windows volume.
  pub fn applied_image(&self) -> Option<AppliedImage> {
    let record = std::fs::read(self.root.join(WINDOWS_DIR).join(APPLIED_IMAGE_FILE)).ok()?;
    serde_json::from_slice(&record).ok()
  }

  /// Wire this device up as the collaborators of an operation context.
  pub fn into_collaborators(self, fetcher: Arc<dyn AssetFetcher>) -> Collaborators {
    let device = Arc::new(self);
    let root = device.root.clone();
    Collaborators {
      device: device.clone(),
      flasher: device.clone(),
      image_service: device,
      dual_boot: Arc::new(move |index: u32| -> Box<dyn DualBootAssistant> {
        Box::new(LoopbackDualBoot {
          disk: disk_path(&root, index),
          state: root.join(format!("disk{}.dualboot", index)),
        })
      }),
      file_system: Arc::new(LocalFileSystem),
      fetcher,
    }
  }

  /// Copy `source` to `destination` chunk by chunk, returning the SHA-256.
  async fn copy_with_progress(
    &self,
    source: &Path,
    destination: &Path,
    progress: &StepProgress,
    cancel: &CancellationToken,
  ) -> Result<String, DeviceError> {
    let mut input = fs::File::open(source)
      .await
      .map_err(|_| DeviceError::not_found(format!("image {}", source.display())))?;
    let size = input
      .metadata()
      .await
      .map_err(|e| DeviceError::io(source, e))?
      .len();
    let mut output = fs::File::create(destination)
      .await
      .map_err(|e| DeviceError::io(destination, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; self.chunk_size];
    let mut copied: u64 = 0;
    loop {
      if cancel.is_cancelled() {
        return Err(DeviceError::Cancelled);
      }
      let read = input.read(&mut buffer).await.map_err(|e| DeviceError::io(source, e))?;
      if read == 0 {
        break;
      }
      output
        .write_all(&buffer[..read])
        .await
        .map_err(|e| DeviceError::io(destination, e))?;
      hasher.update(&buffer[..read]);
      copied += read as u64;
      progress.report_ratio(copied, size);
    }
    output.flush().await.map_err(|e| DeviceError::io(destination, e))?;

    Ok(hex::encode(hasher.finalize()))
  }
}

fn disk_path(root: &Path, index: u32) -> PathBuf {
  root.join(format!("disk{}.img", index))
}

#[async_trait]
impl DeviceAccess for LoopbackDevice {
  async fn disk(&self, index: u32) -> Result<Disk, DeviceError> {
    let path = disk_path(&self.root, index);
    if !fs::try_exists(&path).await.unwrap_or(false) {
      return Err(DeviceError::not_found(format!("disk {}", index)));
    }
    Ok(Disk { index, path })
  }

  async fn windows_volume(&self) -> Result<Volume, DeviceError> {
    let root = self.root.join(WINDOWS_DIR);
    if !root.is_dir() {
      return Err(DeviceError::not_found("Windows volume"));
    }
    Ok(Volume { root })
  }
}

#[async_trait]
impl ImageFlasher for LoopbackDevice {
  async fn flash(
    &self,
    disk: &Disk,
    image: &Path,
    progress: &StepProgress,
    cancel: &CancellationToken,
  ) -> Result<(), DeviceError> {
    info!(disk = disk.index, image = %image.display(), "flashing loopback disk");
    let digest = self.copy_with_progress(image, &disk.path, progress, cancel).await?;

    let mut digest_path = disk.path.clone().into_os_string();
    digest_path.push(".sha256");
    let digest_path = PathBuf::from(digest_path);
    fs::write(&digest_path, &digest)
      .await
      .map_err(|e| DeviceError::io(&digest_path, e))?;

    debug!(disk = disk.index, sha256 = %digest, "flash complete");
    Ok(())
  }
}

#[async_trait]
impl WindowsImageService for LoopbackDevice {
  async fn inject_drivers(&self, origin: &Path, volume: &Volume) -> Result<Vec<InjectedDriver>, DeviceError> {
    if !origin.is_dir() {
      return Err(DeviceError::not_found(format!("driver folder {}", origin.display())));
    }
    let origin = origin.to_path_buf();
    let drivers_dir = volume.root.join(DRIVERS_DIR);

    let injected = tokio::task::spawn_blocking(move || inject_inf_files(&origin, &drivers_dir))
      .await
      .map_err(|e| DeviceError::io(volume.root.as_path(), std::io::Error::other(e)))??;

    info!(count = injected.len(), "injected drivers");
    Ok(injected)
  }

  async fn apply_image(
    &self,
    wim: &Path,
    index: u32,
    volume: &Volume,
    progress: &StepProgress,
    cancel: &CancellationToken,
  ) -> Result<(), DeviceError> {
    info!(image = %wim.display(), index, "applying image to loopback volume");
    let file_name = wim
      .file_name()
      .ok_or_else(|| DeviceError::not_found(format!("image {}", wim.display())))?;
    let destination = volume.root.join(file_name);
    let sha256 = self.copy_with_progress(wim, &destination, progress, cancel).await?;

    let record = AppliedImage {
      source: wim.to_path_buf(),
      index,
      sha256,
    };
    let record_path = volume.root.join(APPLIED_IMAGE_FILE);
    let json = serde_json::to_vec_pretty(&record).map_err(|e| DeviceError::io(&record_path, e.into()))?;
    fs::write(&record_path, json)
      .await
      .map_err(|e| DeviceError::io(&record_path, e))?;
    Ok(())
  }
}

/// Copy every `*.inf` below `origin` into `drivers_dir`, in file-name order.
fn inject_inf_files(origin: &Path, drivers_dir: &Path) -> Result<Vec<InjectedDriver>, DeviceError> {
  std::fs::create_dir_all(drivers_dir).map_err(|e| DeviceError::io(drivers_dir, e))?;

  let mut injected = Vec::new();
  for entry in WalkDir::new(origin).sort_by_file_name() {
    let entry = entry.map_err(|e| DeviceError::io(origin, e.into()))?;
    let is_inf = entry
      .path()
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("inf"));
    if !entry.file_type().is_file() || !is_inf {
      continue;
    }

    let destination = drivers_dir.join(entry.file_name());
    std::fs::copy(entry.path(), &destination).map_err(|e| DeviceError::io(entry.path(), e))?;
    injected.push(InjectedDriver {
      name: entry
        .path()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default(),
      source: entry.path().to_path_buf(),
      destination,
    });
  }
  Ok(injected)
}

struct LoopbackDualBoot {
  disk: PathBuf,
  state: PathBuf,
}

#[async_trait]
impl DualBootAssistant for LoopbackDualBoot {
  async fn toggle_dual_boot(&self, enabled: bool) -> Result<(), DeviceError> {
    if !fs::try_exists(&self.disk).await.unwrap_or(false) {
      return Err(DeviceError::not_found(format!("disk {}", self.disk.display())));
    }
    let state = if enabled { "enabled" } else { "disabled" };
    fs::write(&self.state, state)
      .await
      .map_err(|e| DeviceError::io(&self.state, e))
  }
}
