//! Structured error types for the metrics sync service.

use health_engine::{Category, RepoKey};
use thiserror::Error;

/// The upstream metric source could not deliver a file (404 is not an error; it means "no data").
#[derive(Debug, Error)]
pub enum UpstreamUnavailable {
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("{url} returned an unreadable payload: {reason}")]
  Payload { url: String, reason: String },
}

impl UpstreamUnavailable {
  pub fn status(url: impl Into<String>, status: u16) -> Self {
    Self::Status {
      url: url.into(),
      status,
    }
  }

  pub fn payload(url: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Payload {
      url: url.into(),
      reason: reason.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database: {0}")]
  Database(#[from] sqlx_core::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("sync of {key} failed fetching {category}: {source}")]
  SyncFailed {
    key: RepoKey,
    category: Category,
    #[source]
    source: UpstreamUnavailable,
  },

  #[error("sync of {key} failed persisting: {source}")]
  Store {
    key: RepoKey,
    #[source]
    source: StoreError,
  },
}

impl SyncError {
  pub fn key(&self) -> &RepoKey {
    match self {
      Self::SyncFailed { key, .. } | Self::Store { key, .. } => key,
    }
  }
}

/// The narrative model endpoint could not produce text.
#[derive(Debug, Error)]
pub enum GenerationUnavailable {
  #[error("no API key configured for the narrative model")]
  MissingApiKey,

  #[error("narrative request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("narrative endpoint returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("narrative endpoint returned no content")]
  EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ServiceError {
  /// No snapshot exists and a cold sync could not produce one.
  #[error("no metrics available for {key}")]
  NotFound {
    key: RepoKey,
    #[source]
    cause: Option<Box<SyncError>>,
  },

  #[error(transparent)]
  Sync(#[from] SyncError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl ServiceError {
  pub fn not_found(key: &RepoKey, cause: Option<SyncError>) -> Self {
    Self::NotFound {
      key: key.clone(),
      cause: cause.map(Box::new),
    }
  }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
  #[error("a sweep is already running")]
  SweepInProgress,

  #[error("listing repositories: {0}")]
  Store(#[from] StoreError),
}
