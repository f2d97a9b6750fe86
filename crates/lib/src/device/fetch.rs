//! Downloading remote assets with progress.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::runtime::StepProgress;

/// Upper bound on the buffer reserved from a `Content-Length` header.
const PREALLOCATION_LIMIT: u64 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("download of {url} was cancelled")]
  Cancelled { url: String },
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
  /// Download `url` into memory, reporting progress when the size is known.
  /// Stops with [`FetchError::Cancelled`] once `cancel` fires.
  async fn fetch(&self, url: &str, progress: &StepProgress, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError>;
}

/// [`AssetFetcher`] over HTTP using reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
  async fn fetch(&self, url: &str, progress: &StepProgress, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
    info!(url = %url, "fetching asset");

    let request_error = |source| FetchError::Request {
      url: url.to_string(),
      source,
    };
    let cancelled = || FetchError::Cancelled { url: url.to_string() };

    let mut response = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(cancelled()),
      response = self.client.get(url).send() => response.map_err(request_error)?,
    };
    if !response.status().is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let size = response.content_length();
    let reserve = size.unwrap_or(0).min(PREALLOCATION_LIMIT);
    let mut bytes = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
    loop {
      let chunk = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          debug!(url = %url, received = bytes.len(), "download cancelled");
          return Err(cancelled());
        }
        chunk = response.chunk() => chunk.map_err(request_error)?,
      };
      let Some(chunk) = chunk else {
        break;
      };
      bytes.extend_from_slice(&chunk);
      if let Some(size) = size {
        progress.report_ratio(bytes.len() as u64, size);
      }
    }

    debug!(url = %url, size = bytes.len(), "asset downloaded");
    Ok(bytes)
  }
}
