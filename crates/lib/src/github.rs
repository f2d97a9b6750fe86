//! GitHub repository URLs and branch archives.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::device::{AssetFetcher, FetchError};
use crate::runtime::StepProgress;

static REPO_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"https://github\.com/([\w-]+)/([\w-]+)").ok());

#[derive(Debug, Error)]
pub enum GitHubError {
  #[error("'{0}' is not a GitHub repository URL")]
  NotARepository(String),

  #[error("failed to download {url}")]
  Download {
    url: String,
    #[source]
    source: FetchError,
  },
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
  pub owner: String,
  pub repository: String,
}

impl fmt::Display for RepoInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.repository)
  }
}

/// Extract owner and repository from a `https://github.com/<owner>/<repo>` URL.
///
/// Anything after the repository name (`.git`, paths, queries) is ignored.
pub fn repo_info(url: &str) -> Result<RepoInfo, GitHubError> {
  let captures = REPO_URL
    .as_ref()
    .and_then(|re| re.captures(url))
    .ok_or_else(|| GitHubError::NotARepository(url.to_string()))?;
  Ok(RepoInfo {
    owner: captures[1].to_string(),
    repository: captures[2].to_string(),
  })
}

pub fn branch_archive_url(info: &RepoInfo, branch: &str) -> String {
  format!(
    "https://github.com/{}/{}/archive/{}.zip",
    info.owner, info.repository, branch
  )
}

/// Download the zip archive of `branch` of the repository at `url`.
pub async fn fetch_branch_archive(
  fetcher: &dyn AssetFetcher,
  url: &str,
  branch: &str,
  progress: &StepProgress,
  cancel: &CancellationToken,
) -> Result<Vec<u8>, GitHubError> {
  let info = repo_info(url)?;
  let archive = branch_archive_url(&info, branch);
  info!(repository = %info, branch, "downloading branch archive");
  fetcher
    .fetch(&archive, progress, cancel)
    .await
    .map_err(|source| GitHubError::Download { url: archive, source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::sync::Mutex;

  #[test]
  fn parses_owner_and_repository() {
    let info = repo_info("https://github.com/WOA-Project/Deployment-Scripts").unwrap();
    assert_eq!(info.owner, "WOA-Project");
    assert_eq!(info.repository, "Deployment-Scripts");
  }

  #[test]
  fn ignores_suffixes() {
    let info = repo_info("https://github.com/owner/repo.git").unwrap();
    assert_eq!(info.to_string(), "owner/repo");
    let info = repo_info("https://github.com/owner/repo/tree/dev").unwrap();
    assert_eq!(info.repository, "repo");
  }

  #[test]
  fn rejects_other_hosts() {
    assert!(matches!(
      repo_info("https://gitlab.com/owner/repo"),
      Err(GitHubError::NotARepository(_))
    ));
  }

  #[test]
  fn archive_url_uses_branch() {
    let info = RepoInfo {
      owner: "o".into(),
      repository: "r".into(),
    };
    assert_eq!(branch_archive_url(&info, "main"), "https://github.com/o/r/archive/main.zip");
  }

  struct Recording(Mutex<Vec<String>>);

  #[async_trait]
  impl AssetFetcher for Recording {
    async fn fetch(&self, url: &str, progress: &StepProgress, _cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
      self.0.lock().unwrap().push(url.to_string());
      progress.report(1.0);
      Ok(b"PK".to_vec())
    }
  }

  #[tokio::test]
  async fn fetches_the_archive_url() {
    let fetcher = Recording(Mutex::new(Vec::new()));
    let bytes = fetch_branch_archive(
      &fetcher,
      "https://github.com/o/r",
      "master",
      &StepProgress::detached(),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(bytes, b"PK");
    assert_eq!(
      *fetcher.0.lock().unwrap(),
      vec!["https://github.com/o/r/archive/master.zip".to_string()]
    );
  }
}
