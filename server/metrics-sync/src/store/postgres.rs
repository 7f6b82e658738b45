//! PostgreSQL store: one row per repository, one JSONB column per category.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_engine::{RepoKey, RepoMetricsSnapshot};
use serde::de::DeserializeOwned;
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_core::types::Json;
use sqlx_postgres::{PgPool, PgRow, Postgres};

use super::MetricsStore;
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_repo_metrics.sql");

const SELECT_ONE: &str = r#"
  SELECT platform, owner, repo, activity, issues, pull_requests, code_changes,
         contributors, openrank, attention, last_sync_time
  FROM repo_metrics
  WHERE platform = $1 AND owner = $2 AND repo = $3
"#;

const SELECT_KEYS: &str = "SELECT platform, owner, repo FROM repo_metrics ORDER BY platform, owner, repo";

// Every category column is overwritten, so categories missing from this sync become NULL.
const UPSERT: &str = r#"
  INSERT INTO repo_metrics (platform, owner, repo, activity, issues, pull_requests, code_changes,
                            contributors, openrank, attention, last_sync_time)
  VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
  ON CONFLICT (platform, owner, repo) DO UPDATE SET
    activity = EXCLUDED.activity,
    issues = EXCLUDED.issues,
    pull_requests = EXCLUDED.pull_requests,
    code_changes = EXCLUDED.code_changes,
    contributors = EXCLUDED.contributors,
    openrank = EXCLUDED.openrank,
    attention = EXCLUDED.attention,
    last_sync_time = EXCLUDED.last_sync_time
"#;

const DELETE: &str = "DELETE FROM repo_metrics WHERE platform = $1 AND owner = $2 AND repo = $3";

pub struct PgMetricsStore {
  pool: PgPool,
}

impl PgMetricsStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    let pool = PgPool::connect(database_url).await?;
    Ok(Self::new(pool))
  }

  /// Create the table if it does not exist yet.
  pub async fn ensure_schema(&self) -> Result<(), StoreError> {
    query::<Postgres>(SCHEMA).execute(&self.pool).await?;
    Ok(())
  }
}

fn key_from_row(row: &PgRow) -> Result<RepoKey, StoreError> {
  Ok(RepoKey {
    platform: row.try_get("platform")?,
    owner: row.try_get("owner")?,
    repo: row.try_get("repo")?,
  })
}

/// Nullable JSONB column.
fn json_column<T: DeserializeOwned + 'static>(row: &PgRow, column: &str) -> Result<Option<T>, StoreError> {
  Ok(row.try_get::<Option<Json<T>>, _>(column)?.map(|j| j.0))
}

fn snapshot_from_row(row: &PgRow) -> Result<RepoMetricsSnapshot, StoreError> {
  Ok(RepoMetricsSnapshot {
    key: key_from_row(row)?,
    activity: json_column(row, "activity")?,
    issues: json_column(row, "issues")?,
    pull_requests: json_column(row, "pull_requests")?,
    code_changes: json_column(row, "code_changes")?,
    contributors: json_column(row, "contributors")?,
    openrank: json_column(row, "openrank")?,
    attention: json_column(row, "attention")?,
    last_sync_time: row.try_get::<DateTime<Utc>, _>("last_sync_time")?,
  })
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
  async fn find_one(&self, key: &RepoKey) -> Result<Option<RepoMetricsSnapshot>, StoreError> {
    let row = query::<Postgres>(SELECT_ONE)
      .bind(key.platform.as_str())
      .bind(key.owner.as_str())
      .bind(key.repo.as_str())
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(snapshot_from_row).transpose()
  }

  async fn find_all(&self) -> Result<Vec<RepoKey>, StoreError> {
    let rows = query::<Postgres>(SELECT_KEYS).fetch_all(&self.pool).await?;
    rows.iter().map(key_from_row).collect()
  }

  async fn upsert(&self, s: &RepoMetricsSnapshot) -> Result<(), StoreError> {
    query::<Postgres>(UPSERT)
      .bind(s.key.platform.as_str())
      .bind(s.key.owner.as_str())
      .bind(s.key.repo.as_str())
      .bind(s.activity.as_ref().map(Json))
      .bind(s.issues.as_ref().map(Json))
      .bind(s.pull_requests.as_ref().map(Json))
      .bind(s.code_changes.as_ref().map(Json))
      .bind(s.contributors.as_ref().map(Json))
      .bind(s.openrank.as_ref().map(Json))
      .bind(s.attention.as_ref().map(Json))
      .bind(s.last_sync_time)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete(&self, key: &RepoKey) -> Result<u64, StoreError> {
    let result = query::<Postgres>(DELETE)
      .bind(key.platform.as_str())
      .bind(key.owner.as_str())
      .bind(key.repo.as_str())
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }
}
