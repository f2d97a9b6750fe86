//! Deployment tasks: one per planned step.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::context::RuntimeConfig;
use super::error::TaskError;
use super::metadata::{metadata_path, random_token};
use super::plan::Action;
use super::progress::StepProgress;
use crate::consts::{INJECTED_DRIVERS_DIR, REPOSITORIES_DIR};
use crate::device::Collaborators;
use crate::github;

/// What a task can reach while it runs.
pub struct TaskEnv<'a> {
  pub collaborators: &'a Collaborators,
  pub config: &'a RuntimeConfig,
  pub progress: &'a StepProgress,
  pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait DeploymentTask: Send + Sync {
  /// Run the task, returning the progress item describing what it did.
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError>;
}

pub fn task_for(action: &Action) -> Box<dyn DeploymentTask> {
  match action.clone() {
    Action::Flash { image, disk } => Box::new(Flash { image, disk }),
    Action::ApplyImage { wim, index, disk } => Box::new(ApplyImage { wim, index, disk }),
    Action::InjectDrivers { origin } => Box::new(InjectDrivers { origin }),
    Action::ToggleDualBoot { disk, enabled } => Box::new(ToggleDualBoot { disk, enabled }),
    Action::DisplayMarkdown { message } => Box::new(DisplayMarkdown { message }),
    Action::FetchRepository { url, branch } => Box::new(FetchRepository { url, branch }),
  }
}

struct Flash {
  image: PathBuf,
  disk: u32,
}

#[async_trait]
impl DeploymentTask for Flash {
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError> {
    let disk = env.collaborators.device.disk(self.disk).await?;
    env
      .collaborators
      .flasher
      .flash(&disk, &self.image, env.progress, env.cancel)
      .await?;
    Ok(format!("Flashed {} onto disk {}", self.image.display(), self.disk))
  }
}

struct ApplyImage {
  wim: PathBuf,
  index: u32,
  disk: u32,
}

#[async_trait]
impl DeploymentTask for ApplyImage {
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError> {
    // the disk must exist even though the image goes to its Windows volume
    env.collaborators.device.disk(self.disk).await?;
    let volume = env.collaborators.device.windows_volume().await?;
    env
      .collaborators
      .image_service
      .apply_image(&self.wim, self.index, &volume, env.progress, env.cancel)
      .await?;
    Ok(format!(
      "Applied image {} of {} to disk {}",
      self.index,
      self.wim.display(),
      self.disk
    ))
  }
}

struct InjectDrivers {
  origin: PathBuf,
}

#[async_trait]
impl DeploymentTask for InjectDrivers {
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError> {
    let volume = env.collaborators.device.windows_volume().await?;
    let drivers = env
      .collaborators
      .image_service
      .inject_drivers(&self.origin, &volume)
      .await?;

    let fs = env.collaborators.file_system.as_ref();
    let dir = env.config.artifacts_dir.join(INJECTED_DRIVERS_DIR);
    fs.create_dir_all(&dir).await.map_err(|source| TaskError::Artifact {
      path: dir.clone(),
      source,
    })?;
    let path = metadata_path(fs, &dir, &self.origin, random_token).await;
    let json = serde_json::to_vec_pretty(&drivers)?;
    fs.write(&path, &json).await.map_err(|source| TaskError::Artifact {
      path: path.clone(),
      source,
    })?;

    info!(count = drivers.len(), metadata = %path.display(), "driver metadata saved");
    Ok(format!(
      "Injected {} driver(s) from {}",
      drivers.len(),
      self.origin.display()
    ))
  }
}

struct ToggleDualBoot {
  disk: u32,
  enabled: bool,
}

#[async_trait]
impl DeploymentTask for ToggleDualBoot {
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError> {
    (env.collaborators.dual_boot)(self.disk)
      .toggle_dual_boot(self.enabled)
      .await?;
    let state = if self.enabled { "Enabled" } else { "Disabled" };
    Ok(format!("{} dual boot on disk {}", state, self.disk))
  }
}

struct DisplayMarkdown {
  message: String,
}

#[async_trait]
impl DeploymentTask for DisplayMarkdown {
  async fn execute(&self, _env: &TaskEnv<'_>) -> Result<String, TaskError> {
    info!(message = %self.message, "script message");
    Ok(self.message.clone())
  }
}

struct FetchRepository {
  url: String,
  branch: String,
}

impl FetchRepository {
  /// `<root>/Repositories/<owner>-<repo>-<branch>.zip`; separators in the
  /// branch name become `-` so the archive stays a single file name.
  fn destination(&self, root: &Path, info: &github::RepoInfo) -> PathBuf {
    let branch: String = self
      .branch
      .chars()
      .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
      .collect();
    root
      .join(REPOSITORIES_DIR)
      .join(format!("{}-{}-{}.zip", info.owner, info.repository, branch))
  }
}

#[async_trait]
impl DeploymentTask for FetchRepository {
  async fn execute(&self, env: &TaskEnv<'_>) -> Result<String, TaskError> {
    let info = github::repo_info(&self.url)?;
    let archive = github::fetch_branch_archive(
      env.collaborators.fetcher.as_ref(),
      &self.url,
      &self.branch,
      env.progress,
      env.cancel,
    )
    .await?;

    let fs = env.collaborators.file_system.as_ref();
    let path = self.destination(&env.config.artifacts_dir, &info);
    if let Some(parent) = path.parent() {
      fs.create_dir_all(parent).await.map_err(|source| TaskError::Artifact {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs.write(&path, &archive).await.map_err(|source| TaskError::Artifact {
      path: path.clone(),
      source,
    })?;

    Ok(format!("Downloaded {}@{} to {}", info, self.branch, path.display()))
  }
}
