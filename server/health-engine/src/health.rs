//! Composite project health: aggregates sub-scores into the four weighted dimensions.

use serde::{Deserialize, Serialize};

use crate::score::{self, clamp_score, ThroughputScore};
use crate::types::RepoMetricsSnapshot;

/// Fixed score for dimensions that have no real computation yet.
pub const PLACEHOLDER_SCORE: f64 = 70.0;

const ACTIVITY_WEIGHT: f64 = 0.3;
const COMMUNITY_WEIGHT: f64 = 0.3;
const CODE_QUALITY_WEIGHT: f64 = 0.2;
const DOCUMENTATION_WEIGHT: f64 = 0.2;

const COMMIT_FREQUENCY_WEIGHT: f64 = 0.4;
const ISSUE_ACTIVITY_WEIGHT: f64 = 0.3;
const PR_ACTIVITY_WEIGHT: f64 = 0.3;

const CONTRIBUTOR_WEIGHT: f64 = 0.4;
const ISSUE_RESPONSE_WEIGHT: f64 = 0.3;
const PR_PROCESSING_WEIGHT: f64 = 0.3;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScoreBreakdown {
  pub overall_score: f64,
  pub activity_score: f64,
  pub community_score: f64,
  pub code_quality_score: f64,
  pub documentation_score: f64,
  pub details: HealthDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
  pub activity: ActivityDetails,
  pub community: CommunityDetails,
  pub code_quality: DimensionDetails,
  pub documentation: DimensionDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetails {
  pub commit_frequency: f64,
  pub issue_activity: f64,
  pub pr_activity: f64,
  pub issues: ThroughputScore,
  pub pull_requests: ThroughputScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDetails {
  pub contributor_score: f64,
  pub avg_monthly_contributors: f64,
  pub issue_response_score: f64,
  pub pr_processing_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionDetails {
  pub score: f64,
  /// True while the dimension is a fixed stand-in rather than a computed score.
  pub placeholder: bool,
}

// ---------------------------------------------------------------------------
// Pluggable dimensions
// ---------------------------------------------------------------------------

/// A health dimension computed independently of the activity/community formulas.
pub trait DimensionScore: Send + Sync {
  fn evaluate(&self, snapshot: &RepoMetricsSnapshot) -> DimensionDetails;
}

/// Constant stand-in score.
#[derive(Debug, Clone, Copy)]
pub struct FixedScore(pub f64);

impl DimensionScore for FixedScore {
  fn evaluate(&self, _snapshot: &RepoMetricsSnapshot) -> DimensionDetails {
    DimensionDetails {
      score: clamp_score(self.0),
      placeholder: true,
    }
  }
}

/// Scoring model. Code quality and documentation are swappable; the aggregation is not.
pub struct HealthModel {
  code_quality: Box<dyn DimensionScore>,
  documentation: Box<dyn DimensionScore>,
}

impl Default for HealthModel {
  fn default() -> Self {
    Self {
      code_quality: Box::new(FixedScore(PLACEHOLDER_SCORE)),
      documentation: Box::new(FixedScore(PLACEHOLDER_SCORE)),
    }
  }
}

impl HealthModel {
  pub fn with_code_quality(mut self, scorer: impl DimensionScore + 'static) -> Self {
    self.code_quality = Box::new(scorer);
    self
  }

  pub fn with_documentation(mut self, scorer: impl DimensionScore + 'static) -> Self {
    self.documentation = Box::new(scorer);
    self
  }

  pub fn evaluate(&self, snapshot: &RepoMetricsSnapshot) -> HealthScoreBreakdown {
    let issues = snapshot.issues.as_ref();
    let prs = snapshot.pull_requests.as_ref();

    // Activity.
    let commit_frequency = score::commit_frequency_score(snapshot.activity.as_ref());
    let issue_throughput = match issues {
      Some(m) => score::throughput_score(
        m.new.as_ref(),
        m.closed.as_ref(),
        m.response_time.as_ref(),
        m.resolution_duration.as_ref(),
      ),
      None => ThroughputScore::default(),
    };
    let pr_throughput = match prs {
      Some(m) => score::throughput_score(
        m.change_requests.as_ref(),
        m.accepted.as_ref(),
        m.response_time.as_ref(),
        m.resolution_duration.as_ref(),
      ),
      None => ThroughputScore::default(),
    };
    let activity_score = clamp_score(
      commit_frequency * COMMIT_FREQUENCY_WEIGHT
        + issue_throughput.total * ISSUE_ACTIVITY_WEIGHT
        + pr_throughput.total * PR_ACTIVITY_WEIGHT,
    );

    // Community.
    let contributors = snapshot.contributors.as_ref().and_then(|c| c.contributors.as_ref());
    let avg_monthly_contributors = score::avg_monthly_contributors(contributors);
    let contributor_score = score::contributor_score(contributors);
    let issue_response_score = score::response_time_score(issues.and_then(|m| m.response_time.as_ref()));
    let pr_processing_score =
      score::resolution_time_score(prs.and_then(|m| m.resolution_duration.as_ref()));
    let community_score = clamp_score(
      contributor_score * CONTRIBUTOR_WEIGHT
        + issue_response_score * ISSUE_RESPONSE_WEIGHT
        + pr_processing_score * PR_PROCESSING_WEIGHT,
    );

    let code_quality = self.code_quality.evaluate(snapshot);
    let documentation = self.documentation.evaluate(snapshot);

    let overall_score = clamp_score(
      activity_score * ACTIVITY_WEIGHT
        + community_score * COMMUNITY_WEIGHT
        + code_quality.score * CODE_QUALITY_WEIGHT
        + documentation.score * DOCUMENTATION_WEIGHT,
    );

    HealthScoreBreakdown {
      overall_score,
      activity_score,
      community_score,
      code_quality_score: code_quality.score,
      documentation_score: documentation.score,
      details: HealthDetails {
        activity: ActivityDetails {
          commit_frequency,
          issue_activity: issue_throughput.total,
          pr_activity: pr_throughput.total,
          issues: issue_throughput,
          pull_requests: pr_throughput,
        },
        community: CommunityDetails {
          contributor_score,
          avg_monthly_contributors,
          issue_response_score,
          pr_processing_score,
        },
        code_quality,
        documentation,
      },
    }
  }
}
