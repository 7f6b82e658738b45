//! Repository monitoring operations used by the API layer and the CLI.

use health_engine::{build_analysis_prompt, calculate_project_health, HealthScoreBreakdown, RepoKey, RepoMetricsSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::narrative::{parse_narrative, Narrative, NarrativeGenerator};
use crate::orchestrator::Orchestrator;
use crate::store::MetricsStore;

/// Health breakdown plus the optional narrative analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
  pub key: RepoKey,
  pub health: HealthScoreBreakdown,
  pub narrative: Option<Narrative>,
  /// Set when the narrative could not be generated.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub narrative_error: Option<String>,
}

pub struct MetricsService {
  store: Arc<dyn MetricsStore>,
  orchestrator: Arc<Orchestrator>,
}

impl MetricsService {
  pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
    Self {
      store: orchestrator.store().clone(),
      orchestrator,
    }
  }

  /// Stored snapshot, or a cold synchronous sync when there is none yet.
  pub async fn get_repo_metrics(&self, key: &RepoKey) -> Result<RepoMetricsSnapshot, ServiceError> {
    if let Some(snapshot) = self.store.find_one(key).await? {
      return Ok(snapshot);
    }

    info!(repo = %key, "no snapshot stored, syncing on read");
    if let Err(err) = self.orchestrator.sync_repo_metrics(key).await {
      warn!(repo = %key, error = %err, "cold sync failed");
      return Err(ServiceError::not_found(key, Some(err)));
    }
    self
      .store
      .find_one(key)
      .await?
      .ok_or_else(|| ServiceError::not_found(key, None))
  }

  /// Start monitoring a repository. Already-monitored repositories are returned as stored.
  pub async fn add_repo(&self, key: &RepoKey) -> Result<RepoMetricsSnapshot, ServiceError> {
    if let Some(snapshot) = self.store.find_one(key).await? {
      return Ok(snapshot);
    }
    let snapshot = self.orchestrator.sync_repo_metrics(key).await?;
    info!(repo = %key, "repository added");
    Ok(snapshot)
  }

  /// Stop monitoring a repository. Returns how many snapshots were deleted.
  pub async fn remove_repo(&self, key: &RepoKey) -> Result<u64, ServiceError> {
    let deleted = self.store.delete(key).await?;
    info!(repo = %key, deleted, "repository removed");
    Ok(deleted)
  }

  pub async fn project_health(&self, key: &RepoKey) -> Result<HealthScoreBreakdown, ServiceError> {
    let snapshot = self.get_repo_metrics(key).await?;
    Ok(calculate_project_health(&snapshot))
  }

  /// Score the repository and ask `generator` for a narrative. A generation failure still
  /// yields the report, with `narrative` empty and the reason in `narrative_error`.
  pub async fn project_health_report(
    &self,
    key: &RepoKey,
    generator: &dyn NarrativeGenerator,
  ) -> Result<HealthReport, ServiceError> {
    let snapshot = self.get_repo_metrics(key).await?;
    let health = calculate_project_health(&snapshot);
    let prompt = build_analysis_prompt(&snapshot, &health);

    let (narrative, narrative_error) = match generator.analyze(&prompt).await {
      Ok(text) => (Some(parse_narrative(&text)), None),
      Err(err) => {
        warn!(repo = %key, error = %err, "narrative unavailable");
        (None, Some(err.to_string()))
      }
    };

    Ok(HealthReport {
      key: key.clone(),
      health,
      narrative,
      narrative_error,
    })
  }
}
