//! OpenHealth Scoring Engine: deterministic project health scoring; no AI, no DB, no network.
//!
//! Converts a repository metrics snapshot into a 0-100 composite health score with
//! sub-scores, and builds the prompt text handed to the narrative generator.
//! Used by the binary for stdin/stdout and by metrics-sync as a library.

pub mod health;
pub mod prompt;
pub mod score;
pub mod types;

pub use health::{DimensionScore, FixedScore, HealthModel, HealthScoreBreakdown};
pub use prompt::build_analysis_prompt;
pub use types::{Category, CategoryMetrics, CommunityOpenrankGraph, MetricSeries, RepoKey, RepoMetricsSnapshot};

/// Score a snapshot with the default model (no I/O, no hidden state).
pub fn calculate_project_health(snapshot: &RepoMetricsSnapshot) -> HealthScoreBreakdown {
  HealthModel::default().evaluate(snapshot)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn calculate_returns_valid_output_shape() {
    let json = r#"{
      "platform": "github",
      "owner": "acme",
      "repo": "widget",
      "activity": {"2024-01": 10, "2024-02": 10},
      "contributors": {"contributors": {"2024-01": 6, "2024-02": 6}},
      "lastSyncTime": "2024-03-01T02:00:00Z"
    }"#;
    let snapshot: RepoMetricsSnapshot = serde_json::from_str(json).unwrap();
    let out = calculate_project_health(&snapshot);
    assert!(out.overall_score <= 100.0 && out.overall_score >= 0.0);
    assert!((out.details.activity.commit_frequency - 41.65).abs() < 0.01);
    assert!((out.details.community.avg_monthly_contributors - 1.0).abs() < 1e-9);

    let value = serde_json::to_value(&out).unwrap();
    assert!(value.get("overallScore").is_some());
    assert!(value["details"]["community"].get("issueResponseScore").is_some());
  }
}
