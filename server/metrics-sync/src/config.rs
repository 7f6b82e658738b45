//! Service configuration with sane defaults.

use chrono::NaiveTime;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://oss.open-digger.cn";
pub const DEFAULT_NARRATIVE_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_NARRATIVE_MODEL: &str = "llama-3.3-70b-versatile";

const MIB: usize = 1024 * 1024;

/// Upstream metric source settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
  /// Host serving `{platform}/{owner}/{repo}/{file}.json`.
  pub base_url: String,
  /// Timeout applied to every single file request.
  pub request_timeout: Duration,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
      request_timeout: Duration::from_secs(10),
    }
  }
}

/// Storage budget for one snapshot.
#[derive(Debug, Clone)]
pub struct BoundConfig {
  /// Hard budget for the serialized snapshot, in bytes.
  pub max_snapshot_bytes: usize,
  /// Sub-budget reserved for the community OpenRank graph, in bytes.
  pub graph_budget_bytes: usize,
  /// Nodes removed per truncation round before any halving.
  pub initial_step: usize,
  /// Truncation gives up once the step would drop below this.
  pub min_step: usize,
  /// Termination guard for the truncation loop.
  pub max_iterations: usize,
  /// Months of history kept when ordinary series have to be trimmed.
  pub trailing_months: usize,
}

impl Default for BoundConfig {
  fn default() -> Self {
    Self {
      max_snapshot_bytes: 2 * MIB,
      graph_budget_bytes: MIB + MIB / 2,
      initial_step: 1000,
      min_step: 100,
      max_iterations: 10_000,
      trailing_months: 12,
    }
  }
}

/// Narrative model endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
  pub base_url: String,
  pub api_key: Option<String>,
  pub model: String,
  pub temperature: f32,
  pub request_timeout: Duration,
}

impl Default for NarrativeConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_NARRATIVE_BASE_URL.to_string(),
      api_key: None,
      model: DEFAULT_NARRATIVE_MODEL.to_string(),
      temperature: 0.7,
      request_timeout: Duration::from_secs(120),
    }
  }
}

/// Daily sweep schedule.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
  /// Local time of day the sweep fires.
  pub sync_at: NaiveTime,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self {
      sync_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
    }
  }
}
