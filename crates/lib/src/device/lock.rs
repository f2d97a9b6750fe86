//! Exclusive cross-process lock on a device root.
//!
//! Only one process may drive a device at a time. The lock is an OS file lock
//! on `.deployer.lock` inside the device root; it is released when the
//! [`DeviceLock`] is dropped, including when the holding process dies.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOCK_FILENAME: &str = ".deployer.lock";

/// Who holds the lock. Written into the lock file for diagnostics.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub device: PathBuf,
}

#[derive(Debug, Error)]
pub enum DeviceLockError {
  #[error(
    "device is in use by another process: {command} (PID {pid}, started at Unix time {started_at_unix})\n\
     If no deployer process is running, remove the lock file:\n  {lock_path}"
  )]
  Busy {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "device is in use by another process\n\
     If no deployer process is running, remove the lock file:\n  {lock_path}"
  )]
  BusyUnknown { lock_path: PathBuf },

  #[error("failed to open lock file {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to record lock holder: {0}")]
  Record(#[source] io::Error),

  #[error("failed to lock device: {0}")]
  Lock(#[source] io::Error),
}

/// Held lock on a device root.
#[derive(Debug)]
pub struct DeviceLock {
  file: File,
  lock_path: PathBuf,
}

impl DeviceLock {
  /// Take the lock without waiting; a held lock fails with [`DeviceLockError::Busy`].
  pub fn acquire(device_root: &Path, command: &str) -> Result<Self, DeviceLockError> {
    let lock_path = device_root.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(|source| DeviceLockError::Open {
        path: lock_path.clone(),
        source,
      })?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(busy_error(&lock_path));
      }
      return Err(DeviceLockError::Lock(err));
    }

    record_holder(&file, command, device_root)?;
    debug!(path = %lock_path.display(), "device locked");

    Ok(DeviceLock { file, lock_path })
  }

  /// Read the holder record through the held handle.
  pub fn holder(&self) -> io::Result<LockHolder> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn record_holder(file: &File, command: &str, device_root: &Path) -> Result<(), DeviceLockError> {
  let holder = LockHolder {
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    device: device_root.to_path_buf(),
  };

  file.set_len(0).map_err(DeviceLockError::Record)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer(&mut writer, &holder).map_err(|e| DeviceLockError::Record(io::Error::other(e)))?;
  writer.flush().map_err(DeviceLockError::Record)
}

fn busy_error(lock_path: &Path) -> DeviceLockError {
  let holder = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<LockHolder>(&contents).ok());

  match holder {
    Some(holder) => DeviceLockError::Busy {
      command: holder.command,
      pid: holder.pid,
      started_at_unix: holder.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    },
    None => DeviceLockError::BusyUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: a zeroed OVERLAPPED is valid, and the handle is owned by `file`
  // for the duration of the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
