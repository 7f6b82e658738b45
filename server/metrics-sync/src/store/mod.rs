//! Metrics Store: durable keyed storage for the last-synced snapshot of each repository.

mod memory;
mod postgres;

use async_trait::async_trait;
use health_engine::{RepoKey, RepoMetricsSnapshot};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgMetricsStore;

#[async_trait]
pub trait MetricsStore: Send + Sync {
  async fn find_one(&self, key: &RepoKey) -> Result<Option<RepoMetricsSnapshot>, StoreError>;

  /// Keys of every stored repository, ordered.
  async fn find_all(&self) -> Result<Vec<RepoKey>, StoreError>;

  /// Insert or fully overwrite the snapshot stored under `snapshot.key`.
  /// Categories absent from `snapshot` are cleared, never merged.
  async fn upsert(&self, snapshot: &RepoMetricsSnapshot) -> Result<(), StoreError>;

  /// Returns the number of snapshots deleted (0 or 1).
  async fn delete(&self, key: &RepoKey) -> Result<u64, StoreError>;

  async fn exists(&self, key: &RepoKey) -> Result<bool, StoreError> {
    Ok(self.find_one(key).await?.is_some())
  }
}
