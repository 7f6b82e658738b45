//! Sync Orchestrator: fetch every category of a repository, bound the result, persist it.
//!
//! A single repository sync is fail-fast: the first category that cannot be fetched aborts the
//! sync and nothing is written, so a stored snapshot always comes from one complete fetch.
//! A sweep over every stored repository is failure-isolated instead.

use chrono::Utc;
use futures::future::try_join_all;
use health_engine::{Category, RepoKey, RepoMetricsSnapshot};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bound::bound_snapshot;
use crate::config::BoundConfig;
use crate::error::{StoreError, SyncError};
use crate::fetcher::{fetch_category, MetricSource};
use crate::store::MetricsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
  Fetching,
  Bounding,
  Persisting,
  Done,
  Failed,
}

impl fmt::Display for SyncPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Fetching => "fetching",
      Self::Bounding => "bounding",
      Self::Persisting => "persisting",
      Self::Done => "done",
      Self::Failed => "failed",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
  pub key: RepoKey,
  pub reason: String,
}

/// Outcome of one pass over every stored repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  pub synced: Vec<RepoKey>,
  pub failed: Vec<SweepFailure>,
}

impl SweepReport {
  pub fn total(&self) -> usize {
    self.synced.len() + self.failed.len()
  }
}

pub struct Orchestrator {
  source: Arc<dyn MetricSource>,
  store: Arc<dyn MetricsStore>,
  bounds: BoundConfig,
}

impl Orchestrator {
  pub fn new(source: Arc<dyn MetricSource>, store: Arc<dyn MetricsStore>, bounds: BoundConfig) -> Self {
    Self { source, store, bounds }
  }

  pub fn store(&self) -> &Arc<dyn MetricsStore> {
    &self.store
  }

  /// Fetch, bound and persist one repository. Returns the snapshot as stored.
  pub async fn sync_repo_metrics(&self, key: &RepoKey) -> Result<RepoMetricsSnapshot, SyncError> {
    info!(repo = %key, phase = %SyncPhase::Fetching, "sync started");

    let fetches = Category::ALL.iter().map(|&category| {
      let source = self.source.as_ref();
      async move {
        fetch_category(source, category, key)
          .await
          .map_err(|source| SyncError::SyncFailed {
            key: key.clone(),
            category,
            source,
          })
      }
    });
    let fetched = match try_join_all(fetches).await {
      Ok(fetched) => fetched,
      Err(err) => {
        error!(repo = %key, phase = %SyncPhase::Failed, error = %err, "sync aborted");
        return Err(err);
      }
    };

    let mut snapshot = RepoMetricsSnapshot::empty(key.clone(), Utc::now());
    for metrics in fetched.into_iter().flatten() {
      debug!(repo = %key, category = %metrics.category(), "category fetched");
      snapshot.apply(metrics);
    }
    let present = Category::ALL.iter().filter(|c| snapshot.has(**c)).count();
    debug!(repo = %key, phase = %SyncPhase::Bounding, present, "categories fetched");

    let (mut snapshot, report) = bound_snapshot(snapshot, &self.bounds);
    snapshot.last_sync_time = Utc::now();

    debug!(repo = %key, phase = %SyncPhase::Persisting, bytes = report.bytes_after, "writing snapshot");
    if let Err(source) = self.store.upsert(&snapshot).await {
      error!(repo = %key, phase = %SyncPhase::Failed, error = %source, "persist failed");
      return Err(SyncError::Store {
        key: key.clone(),
        source,
      });
    }

    info!(repo = %key, phase = %SyncPhase::Done, present, bytes = report.bytes_after, "sync finished");
    Ok(snapshot)
  }

  /// Sync every stored repository in turn. One repository failing never stops the sweep;
  /// only failing to list the repositories does.
  pub async fn sync_all_metrics(&self) -> Result<SweepReport, StoreError> {
    let keys = self.store.find_all().await?;
    info!(repos = keys.len(), "sweep started");

    let mut report = SweepReport::default();
    for key in keys {
      match self.sync_repo_metrics(&key).await {
        Ok(_) => report.synced.push(key),
        Err(err) => {
          warn!(repo = %err.key(), error = %err, "repository skipped in sweep");
          report.failed.push(SweepFailure {
            key: err.key().clone(),
            reason: err.to_string(),
          });
        }
      }
    }

    info!(synced = report.synced.len(), failed = report.failed.len(), "sweep finished");
    Ok(report)
  }
}
