//! Naming of injected-driver metadata files.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::device::FileSystemOperations;

const TOKEN_LEN: usize = 11;

/// Random lowercase alphanumeric token for metadata file names.
pub fn random_token() -> String {
  let mut token = Uuid::new_v4().simple().to_string();
  token.truncate(TOKEN_LEN);
  token
}

/// Pick `{origin stem}_{token}Info.json` inside `dir`, drawing new tokens
/// until the name is free.
pub async fn metadata_path(
  fs: &dyn FileSystemOperations,
  dir: &Path,
  origin: &Path,
  mut token: impl FnMut() -> String,
) -> PathBuf {
  let stem = origin
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  loop {
    let candidate = dir.join(format!("{}_{}Info.json", stem, token()));
    if !fs.file_exists(&candidate).await {
      return candidate;
    }
  }
}
