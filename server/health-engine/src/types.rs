//! Metrics snapshot data model (JSON contract shared with metrics-sync and the API layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Repository key
// ---------------------------------------------------------------------------

/// Natural key of a monitored repository, e.g. `github/apache/kafka`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoKey {
  pub platform: String,
  pub owner: String,
  pub repo: String,
}

impl RepoKey {
  pub fn new(platform: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
    Self {
      platform: platform.into(),
      owner: owner.into(),
      repo: repo.into(),
    }
  }
}

impl fmt::Display for RepoKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.platform, self.owner, self.repo)
  }
}

// ---------------------------------------------------------------------------
// Category enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
  Activity,
  Issues,
  PullRequests,
  CodeChanges,
  Contributors,
  Openrank,
  Attention,
}

impl Category {
  /// Every category, in sync order.
  pub const ALL: [Category; 7] = [
    Category::Activity,
    Category::Issues,
    Category::PullRequests,
    Category::CodeChanges,
    Category::Contributors,
    Category::Openrank,
    Category::Attention,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Self::Activity => "activity",
      Self::Issues => "issues",
      Self::PullRequests => "pullRequests",
      Self::CodeChanges => "codeChanges",
      Self::Contributors => "contributors",
      Self::Openrank => "openrank",
      Self::Attention => "attention",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ---------------------------------------------------------------------------
// Month-keyed series
// ---------------------------------------------------------------------------

/// True for calendar-month keys shaped `YYYY-MM` (month 01..=12).
pub fn is_month_key(key: &str) -> bool {
  let b = key.as_bytes();
  if b.len() != 7 || b[4] != b'-' {
    return false;
  }
  if !b[..4].iter().all(u8::is_ascii_digit) || !b[5..].iter().all(u8::is_ascii_digit) {
    return false;
  }
  let month = (b[5] - b'0') * 10 + (b[6] - b'0');
  (1..=12).contains(&month)
}

/// Keep only the newest `months` keys of a month-keyed map. Returns how many were dropped.
fn retain_recent_keys<V>(map: &mut BTreeMap<String, V>, months: usize) -> usize {
  if map.len() <= months {
    return 0;
  }
  let cut = map.len() - months;
  match map.keys().nth(cut).cloned() {
    Some(first_kept) => {
      let kept = map.split_off(&first_kept);
      std::mem::replace(map, kept).len()
    }
    None => std::mem::take(map).len(),
  }
}

/// Month-keyed numeric time series. Iteration is always in month order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSeries(BTreeMap<String, f64>);

impl MetricSeries {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn get(&self, month: &str) -> Option<f64> {
    self.0.get(month).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self.0.iter().map(|(k, v)| (k.as_str(), *v))
  }

  pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
    self.0.values().copied()
  }

  pub fn sum(&self) -> f64 {
    self.values().sum()
  }

  /// Arithmetic mean; `None` for an empty series.
  pub fn mean(&self) -> Option<f64> {
    if self.0.is_empty() {
      None
    } else {
      Some(self.sum() / self.0.len() as f64)
    }
  }

  /// The last `n` entries in month order.
  pub fn latest(&self, n: usize) -> Vec<(&str, f64)> {
    let skip = self.0.len().saturating_sub(n);
    self.iter().skip(skip).collect()
  }

  /// Drop everything but the trailing `months` entries. Returns the number dropped.
  pub fn retain_recent(&mut self, months: usize) -> usize {
    retain_recent_keys(&mut self.0, months)
  }
}

impl<K: Into<String>> FromIterator<(K, f64)> for MetricSeries {
  fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }
}

/// Month-keyed pass-through document (ranked contributor lists and the like).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyDetail(BTreeMap<String, Value>);

impl MonthlyDetail {
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn get(&self, month: &str) -> Option<&Value> {
    self.0.get(month)
  }

  pub fn retain_recent(&mut self, months: usize) -> usize {
    retain_recent_keys(&mut self.0, months)
  }
}

impl<K: Into<String>> FromIterator<(K, Value)> for MonthlyDetail {
  fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }
}

// ---------------------------------------------------------------------------
// Community OpenRank graph
// ---------------------------------------------------------------------------

/// Community network document. Nodes are expected ordered by importance, most important first;
/// each node descriptor is an array whose second element is a display label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityOpenrankGraph {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<GraphMeta>,
  #[serde(flatten)]
  pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nodes: Option<Vec<Value>>,
  #[serde(flatten)]
  pub rest: Map<String, Value>,
}

impl CommunityOpenrankGraph {
  pub fn nodes(&self) -> Option<&[Value]> {
    self.meta.as_ref()?.nodes.as_deref()
  }

  pub fn node_count(&self) -> usize {
    self.nodes().map_or(0, <[Value]>::len)
  }

  /// Labels of the first `limit` nodes; descriptors without a string label are skipped.
  pub fn node_labels(&self, limit: usize) -> Vec<&str> {
    self
      .nodes()
      .unwrap_or_default()
      .iter()
      .take(limit)
      .filter_map(|node| node.get(1).and_then(Value::as_str))
      .collect()
  }

  /// Keep only the first `len` nodes.
  pub fn truncate_nodes(&mut self, len: usize) {
    if let Some(nodes) = self.meta.as_mut().and_then(|m| m.nodes.as_mut()) {
      nodes.truncate(len);
    }
  }
}

// ---------------------------------------------------------------------------
// Category bundles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub closed: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comments: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub age: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub response_time: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolution_duration: Option<MetricSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub change_requests: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reviews: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub accepted: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub age: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub response_time: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolution_duration: Option<MetricSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangeMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub add_lines: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remove_lines: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sum_lines: Option<MetricSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contributors: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<MonthlyDetail>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new_contributors: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inactive_contributors: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bus_factor: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub absence_factor: Option<MetricSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenrankMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub openrank: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<MonthlyDetail>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub community_openrank: Option<CommunityOpenrankGraph>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub community_details: Option<MonthlyDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionMetrics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stars: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub technical_fork: Option<MetricSeries>,
}

/// One fetched category, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryMetrics {
  Activity(MetricSeries),
  Issues(IssueMetrics),
  PullRequests(PullRequestMetrics),
  CodeChanges(CodeChangeMetrics),
  Contributors(ContributorMetrics),
  Openrank(OpenrankMetrics),
  Attention(AttentionMetrics),
}

impl CategoryMetrics {
  pub fn category(&self) -> Category {
    match self {
      Self::Activity(_) => Category::Activity,
      Self::Issues(_) => Category::Issues,
      Self::PullRequests(_) => Category::PullRequests,
      Self::CodeChanges(_) => Category::CodeChanges,
      Self::Contributors(_) => Category::Contributors,
      Self::Openrank(_) => Category::Openrank,
      Self::Attention(_) => Category::Attention,
    }
  }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Last-synced metrics document for one repository. Absent categories mean "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetricsSnapshot {
  #[serde(flatten)]
  pub key: RepoKey,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activity: Option<MetricSeries>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issues: Option<IssueMetrics>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pull_requests: Option<PullRequestMetrics>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code_changes: Option<CodeChangeMetrics>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contributors: Option<ContributorMetrics>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub openrank: Option<OpenrankMetrics>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attention: Option<AttentionMetrics>,
  #[serde(default)]
  pub last_sync_time: DateTime<Utc>,
}

impl RepoMetricsSnapshot {
  pub fn empty(key: RepoKey, last_sync_time: DateTime<Utc>) -> Self {
    Self {
      key,
      activity: None,
      issues: None,
      pull_requests: None,
      code_changes: None,
      contributors: None,
      openrank: None,
      attention: None,
      last_sync_time,
    }
  }

  /// Store a fetched category in its slot, replacing whatever was there.
  pub fn apply(&mut self, metrics: CategoryMetrics) {
    match metrics {
      CategoryMetrics::Activity(m) => self.activity = Some(m),
      CategoryMetrics::Issues(m) => self.issues = Some(m),
      CategoryMetrics::PullRequests(m) => self.pull_requests = Some(m),
      CategoryMetrics::CodeChanges(m) => self.code_changes = Some(m),
      CategoryMetrics::Contributors(m) => self.contributors = Some(m),
      CategoryMetrics::Openrank(m) => self.openrank = Some(m),
      CategoryMetrics::Attention(m) => self.attention = Some(m),
    }
  }

  pub fn has(&self, category: Category) -> bool {
    match category {
      Category::Activity => self.activity.is_some(),
      Category::Issues => self.issues.is_some(),
      Category::PullRequests => self.pull_requests.is_some(),
      Category::CodeChanges => self.code_changes.is_some(),
      Category::Contributors => self.contributors.is_some(),
      Category::Openrank => self.openrank.is_some(),
      Category::Attention => self.attention.is_some(),
    }
  }

  pub fn community_graph(&self) -> Option<&CommunityOpenrankGraph> {
    self.openrank.as_ref()?.community_openrank.as_ref()
  }

  pub fn community_graph_mut(&mut self) -> Option<&mut CommunityOpenrankGraph> {
    self.openrank.as_mut()?.community_openrank.as_mut()
  }

  /// Every present time series, across all categories.
  pub fn series_mut(&mut self) -> Vec<&mut MetricSeries> {
    let mut out: Vec<&mut Option<MetricSeries>> = vec![&mut self.activity];
    if let Some(m) = self.issues.as_mut() {
      out.extend([
        &mut m.new,
        &mut m.closed,
        &mut m.comments,
        &mut m.age,
        &mut m.response_time,
        &mut m.resolution_duration,
      ]);
    }
    if let Some(m) = self.pull_requests.as_mut() {
      out.extend([
        &mut m.change_requests,
        &mut m.reviews,
        &mut m.accepted,
        &mut m.age,
        &mut m.response_time,
        &mut m.resolution_duration,
      ]);
    }
    if let Some(m) = self.code_changes.as_mut() {
      out.extend([&mut m.add_lines, &mut m.remove_lines, &mut m.sum_lines]);
    }
    if let Some(m) = self.contributors.as_mut() {
      out.extend([
        &mut m.contributors,
        &mut m.new_contributors,
        &mut m.inactive_contributors,
        &mut m.bus_factor,
        &mut m.absence_factor,
      ]);
    }
    if let Some(m) = self.openrank.as_mut() {
      out.push(&mut m.openrank);
    }
    if let Some(m) = self.attention.as_mut() {
      out.extend([&mut m.stars, &mut m.technical_fork]);
    }
    out.into_iter().filter_map(Option::as_mut).collect()
  }

  /// Slots of every monthly detail document (present or not).
  pub fn detail_slots_mut(&mut self) -> Vec<&mut Option<MonthlyDetail>> {
    let mut out = Vec::new();
    if let Some(m) = self.contributors.as_mut() {
      out.push(&mut m.details);
    }
    if let Some(m) = self.openrank.as_mut() {
      out.push(&mut m.details);
      out.push(&mut m.community_details);
    }
    out
  }
}
