//! Integration tests for the scoring engine.

use health_engine::score::commit_frequency_score;
use health_engine::{calculate_project_health, MetricSeries, RepoMetricsSnapshot};
use proptest::prelude::*;

fn fixture_snapshot() -> RepoMetricsSnapshot {
  let json = r#"{
    "platform": "github",
    "owner": "acme",
    "repo": "widget",
    "activity": {"2024-01": 31.5, "2024-02": 28.1, "2024-03": 40.2},
    "issues": {
      "new": {"2024-01": 12, "2024-02": 9, "2024-03": 15},
      "closed": {"2024-01": 10, "2024-02": 11, "2024-03": 13},
      "responseTime": {"2024-01": 2.5, "2024-02": 3.1, "2024-03": 1.9},
      "resolutionDuration": {"2024-01": 14.0, "2024-02": 9.5, "2024-03": 11.2}
    },
    "pullRequests": {
      "changeRequests": {"2024-01": 20, "2024-02": 18, "2024-03": 25},
      "accepted": {"2024-01": 15, "2024-02": 16, "2024-03": 21},
      "resolutionDuration": {"2024-01": 3.0, "2024-02": 2.2, "2024-03": 4.1}
    },
    "contributors": {
      "contributors": {"2024-01": 14, "2024-02": 11, "2024-03": 17},
      "busFactor": {"2024-01": 3, "2024-02": 3, "2024-03": 4}
    },
    "openrank": {
      "openrank": {"2024-01": 5.2, "2024-02": 5.9, "2024-03": 6.3},
      "communityOpenrank": {"meta": {"nodes": [["u1", "alice"], ["u2", "bob"]]}, "data": {}}
    },
    "attention": {"stars": {"2024-01": 120, "2024-02": 98, "2024-03": 143}},
    "lastSyncTime": "2024-04-01T02:00:00Z"
  }"#;
  serde_json::from_str(json).unwrap()
}

#[test]
fn identical_input_gives_identical_output() {
  let snapshot = fixture_snapshot();
  let a = calculate_project_health(&snapshot);
  let b = calculate_project_health(&snapshot.clone());
  assert_eq!(a, b);
  assert_eq!(
    serde_json::to_string(&a).unwrap(),
    serde_json::to_string(&b).unwrap(),
    "Same snapshot must produce identical JSON"
  );
}

#[test]
fn every_score_is_within_bounds() {
  let b = calculate_project_health(&fixture_snapshot());
  let d = &b.details;
  for s in [
    b.overall_score,
    b.activity_score,
    b.community_score,
    b.code_quality_score,
    b.documentation_score,
    d.activity.commit_frequency,
    d.activity.issue_activity,
    d.activity.pr_activity,
    d.community.contributor_score,
    d.community.issue_response_score,
    d.community.pr_processing_score,
  ] {
    assert!((0.0..=100.0).contains(&s), "score {} out of range", s);
  }
  // Response time absent for pull requests → neutral term.
  assert_eq!(d.activity.pull_requests.response, 50.0);
}

#[test]
fn empty_snapshot_matches_documented_defaults() {
  let json = r#"{"platform": "gitee", "owner": "x", "repo": "y"}"#;
  let snapshot: RepoMetricsSnapshot = serde_json::from_str(json).unwrap();
  let b = calculate_project_health(&snapshot);
  assert_eq!(b.activity_score, 0.0);
  assert!((b.community_score - 30.0).abs() < 1e-9);
  assert!((b.overall_score - 37.0).abs() < 1e-9);
}

proptest! {
  #[test]
  fn commit_frequency_is_bounded_and_monotonic(a in 0.0f64..1e7, b in 0.0f64..1e7) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo_series: MetricSeries = [("2024-01", lo)].into_iter().collect();
    let hi_series: MetricSeries = [("2024-01", hi)].into_iter().collect();
    let lo_score = commit_frequency_score(Some(&lo_series));
    let hi_score = commit_frequency_score(Some(&hi_series));
    prop_assert!((0.0..=100.0).contains(&lo_score));
    prop_assert!((0.0..=100.0).contains(&hi_score));
    prop_assert!(lo_score <= hi_score);
  }

  #[test]
  fn overall_score_is_bounded(values in proptest::collection::vec(-1e6f64..1e6, 0..24)) {
    let series: MetricSeries = values
      .iter()
      .enumerate()
      .map(|(i, v)| (format!("{}-{:02}", 2020 + i / 12, i % 12 + 1), *v))
      .collect();
    let json = serde_json::json!({
      "platform": "github", "owner": "o", "repo": "r",
      "activity": series,
      "issues": {"new": series, "responseTime": series},
      "contributors": {"contributors": series},
    });
    let snapshot: RepoMetricsSnapshot = serde_json::from_value(json).unwrap();
    let b = calculate_project_health(&snapshot);
    prop_assert!((0.0..=100.0).contains(&b.overall_score));
    prop_assert!((0.0..=100.0).contains(&b.community_score));
  }
}
