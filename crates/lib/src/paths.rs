//! Application directories.
//!
//! Every directory can be redirected through an environment variable so tests
//! and scripted runs stay isolated:
//! - `DEPLOYER_ROOT` replaces the data directory
//! - `DEPLOYER_ARTIFACTS` replaces the artifacts directory

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Ok(root) = std::env::var("DEPLOYER_ROOT") {
    return PathBuf::from(root);
  }
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Ok(root) = std::env::var("DEPLOYER_ROOT") {
    return PathBuf::from(root);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Returns the directory where runs leave their artifacts (driver metadata,
/// downloaded repositories).
pub fn artifacts_dir() -> PathBuf {
  if let Ok(path) = std::env::var("DEPLOYER_ARTIFACTS") {
    return PathBuf::from(path);
  }
  data_dir().join("artifacts")
}
