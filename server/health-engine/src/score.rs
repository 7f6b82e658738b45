//! Sub-score formulas. All of them use logarithmic decay to dampen outliers and land in [0, 100].

use serde::{Deserialize, Serialize};

use crate::types::MetricSeries;

/// Score used for a response/resolution term when its series is absent.
pub const NEUTRAL_TIME_SCORE: f64 = 50.0;

const RESPONSE_TIME_DECAY: f64 = 15.0;
const RESOLUTION_TIME_DECAY: f64 = 10.0;
const VOLUME_SCALE: f64 = 40.0;
const MONTHS_PER_YEAR: f64 = 12.0;

const OPENED_WEIGHT: f64 = 0.3;
const CLOSED_WEIGHT: f64 = 0.3;
const RESPONSE_WEIGHT: f64 = 0.2;
const RESOLUTION_WEIGHT: f64 = 0.2;

/// Clamp to [0, 100]; NaN (e.g. log of a negative mean) becomes 0.
pub fn clamp_score(x: f64) -> f64 {
  if x.is_nan() {
    0.0
  } else {
    x.clamp(0.0, 100.0)
  }
}

/// `min(100, log10(x + 1) * 40)`.
pub fn log_volume_score(x: f64) -> f64 {
  clamp_score((x + 1.0).log10() * VOLUME_SCALE)
}

/// Mean monthly commit activity mapped through the volume curve. Absent or empty → 0.
pub fn commit_frequency_score(activity: Option<&MetricSeries>) -> f64 {
  activity
    .and_then(MetricSeries::mean)
    .map(log_volume_score)
    .unwrap_or(0.0)
}

/// Yearly total spread over 12 months, mapped through the volume curve. Absent → 0.
pub fn monthly_volume_score(series: Option<&MetricSeries>) -> f64 {
  series
    .map(|s| log_volume_score(s.sum() / MONTHS_PER_YEAR))
    .unwrap_or(0.0)
}

fn time_decay_score(series: Option<&MetricSeries>, decay: f64) -> f64 {
  match series.and_then(MetricSeries::mean) {
    Some(mean) => clamp_score(100.0 - (mean + 1.0).log2() * decay),
    None => NEUTRAL_TIME_SCORE,
  }
}

/// Faster first responses score higher. Absent → 50.
pub fn response_time_score(series: Option<&MetricSeries>) -> f64 {
  time_decay_score(series, RESPONSE_TIME_DECAY)
}

/// Shorter resolution durations score higher. Absent → 50.
pub fn resolution_time_score(series: Option<&MetricSeries>) -> f64 {
  time_decay_score(series, RESOLUTION_TIME_DECAY)
}

/// Average monthly active contributors: negative months count as zero, total spread over 12.
pub fn avg_monthly_contributors(series: Option<&MetricSeries>) -> f64 {
  series
    .map(|s| s.values().map(|v| v.max(0.0)).sum::<f64>() / MONTHS_PER_YEAR)
    .unwrap_or(0.0)
}

pub fn contributor_score(series: Option<&MetricSeries>) -> f64 {
  log_volume_score(avg_monthly_contributors(series))
}

/// Issue or pull request throughput, with every term that went into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputScore {
  /// New issues / opened pull requests.
  pub opened: f64,
  /// Closed issues / merged pull requests.
  pub closed: f64,
  pub response: f64,
  pub resolution: f64,
  pub total: f64,
}

/// Weighted throughput score.
///
/// Without any count series there is nothing to measure and every term is zero.
pub fn throughput_score(
  opened: Option<&MetricSeries>,
  closed: Option<&MetricSeries>,
  response_time: Option<&MetricSeries>,
  resolution_duration: Option<&MetricSeries>,
) -> ThroughputScore {
  if opened.is_none() && closed.is_none() {
    return ThroughputScore::default();
  }

  let opened = monthly_volume_score(opened);
  let closed = monthly_volume_score(closed);
  let response = response_time_score(response_time);
  let resolution = resolution_time_score(resolution_duration);
  let total = clamp_score(
    opened * OPENED_WEIGHT
      + closed * CLOSED_WEIGHT
      + response * RESPONSE_WEIGHT
      + resolution * RESOLUTION_WEIGHT,
  );

  ThroughputScore {
    opened,
    closed,
    response,
    resolution,
    total,
  }
}
