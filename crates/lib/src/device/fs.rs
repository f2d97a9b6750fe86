//! File-system access used for run artifacts.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait FileSystemOperations: Send + Sync {
  async fn file_exists(&self, path: &Path) -> bool;
  async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
  async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The local file system through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystemOperations for LocalFileSystem {
  async fn file_exists(&self, path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
  }

  async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
  }

  async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.flush().await
  }
}
