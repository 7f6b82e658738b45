//! In-memory store for tests and dry runs.

use async_trait::async_trait;
use health_engine::{RepoKey, RepoMetricsSnapshot};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::MetricsStore;
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
  rows: RwLock<BTreeMap<RepoKey, RepoMetricsSnapshot>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn len(&self) -> usize {
    self.rows.read().await.len()
  }
}

#[async_trait]
impl MetricsStore for MemoryStore {
  async fn find_one(&self, key: &RepoKey) -> Result<Option<RepoMetricsSnapshot>, StoreError> {
    Ok(self.rows.read().await.get(key).cloned())
  }

  async fn find_all(&self) -> Result<Vec<RepoKey>, StoreError> {
    Ok(self.rows.read().await.keys().cloned().collect())
  }

  async fn upsert(&self, snapshot: &RepoMetricsSnapshot) -> Result<(), StoreError> {
    self
      .rows
      .write()
      .await
      .insert(snapshot.key.clone(), snapshot.clone());
    Ok(())
  }

  async fn delete(&self, key: &RepoKey) -> Result<u64, StoreError> {
    Ok(u64::from(self.rows.write().await.remove(key).is_some()))
  }
}
