//! Size Bounder: keeps a serialized snapshot within the storage budget.
//!
//! Phases, each applied only while still over budget (the graph phase always runs against its
//! own sub-budget):
//! 1. Truncate the community OpenRank graph's node list from the tail.
//! 2. Trim every series and monthly detail document to the trailing months.
//! 3. Drop monthly detail documents.
//!
//! Never fails: the result is always a subset of the input, even when still oversized.

use health_engine::{CommunityOpenrankGraph, RepoMetricsSnapshot};
use serde::Serialize;
use std::io;
use tracing::{info, warn};

use crate::config::BoundConfig;

/// `io::Write` sink that only counts bytes.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0 += buf.len();
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// Length of the compact JSON encoding of `value`.
pub fn serialized_size<T: Serialize + ?Sized>(value: &T) -> usize {
  let mut counter = ByteCounter(0);
  match serde_json::to_writer(&mut counter, value) {
    Ok(()) => counter.0,
    Err(_) => usize::MAX,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTruncation {
  pub nodes_before: usize,
  pub nodes_after: usize,
  pub bytes_before: usize,
  pub bytes_after: usize,
  pub iterations: usize,
  pub fits: bool,
}

/// Truncate the graph's node list from the tail until it fits `graph_budget_bytes`.
///
/// Returns `None` (graph untouched) when there is no node list. Step halving stops once the
/// step would drop below `min_step`, and the loop never exceeds `max_iterations`, so the
/// result may still be over budget.
pub fn truncate_graph(graph: &mut CommunityOpenrankGraph, config: &BoundConfig) -> Option<GraphTruncation> {
  let mut nodes = match graph.meta.as_mut().and_then(|m| m.nodes.as_mut()) {
    Some(nodes) => std::mem::take(nodes),
    None => return None,
  };

  // Size of the graph holding the first k nodes: base + node bytes + (k - 1) commas.
  let base = serialized_size(&*graph);
  let mut prefix = Vec::with_capacity(nodes.len() + 1);
  prefix.push(0usize);
  for node in &nodes {
    let last = prefix[prefix.len() - 1];
    prefix.push(last + serialized_size(node));
  }
  let size_with = |k: usize| base + prefix[k] + k.saturating_sub(1);

  let total = nodes.len();
  let budget = config.graph_budget_bytes;
  let min_step = config.min_step.max(1);
  let mut keep = total;
  let mut step = config.initial_step.max(min_step);
  let mut iterations = 0;

  if size_with(keep) > budget {
    while iterations < config.max_iterations {
      iterations += 1;
      if keep < step {
        step /= 2;
        if step < min_step {
          break;
        }
        continue;
      }
      keep -= step;
      if size_with(keep) <= budget {
        break;
      }
    }
  }

  nodes.truncate(keep);
  if let Some(slot) = graph.meta.as_mut().and_then(|m| m.nodes.as_mut()) {
    *slot = nodes;
  }

  Some(GraphTruncation {
    nodes_before: total,
    nodes_after: keep,
    bytes_before: size_with(total),
    bytes_after: size_with(keep),
    iterations,
    fits: size_with(keep) <= budget,
  })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundReport {
  pub bytes_before: usize,
  pub bytes_after: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub graph: Option<GraphTruncation>,
  /// Month entries removed by the trailing-window trim.
  pub months_trimmed: usize,
  pub details_dropped: usize,
  pub within_budget: bool,
}

/// Bound a snapshot to `max_snapshot_bytes`.
pub fn bound_snapshot(mut snapshot: RepoMetricsSnapshot, config: &BoundConfig) -> (RepoMetricsSnapshot, BoundReport) {
  let bytes_before = serialized_size(&snapshot);
  let graph = snapshot
    .community_graph_mut()
    .and_then(|g| truncate_graph(g, config));
  let mut size = serialized_size(&snapshot);

  let mut months_trimmed = 0;
  if size > config.max_snapshot_bytes {
    for series in snapshot.series_mut() {
      months_trimmed += series.retain_recent(config.trailing_months);
    }
    for detail in snapshot.detail_slots_mut().into_iter().flatten() {
      months_trimmed += detail.retain_recent(config.trailing_months);
    }
    size = serialized_size(&snapshot);
  }

  let mut details_dropped = 0;
  if size > config.max_snapshot_bytes {
    for slot in snapshot.detail_slots_mut() {
      if slot.take().is_some() {
        details_dropped += 1;
      }
    }
    size = serialized_size(&snapshot);
  }

  let report = BoundReport {
    bytes_before,
    bytes_after: size,
    graph,
    months_trimmed,
    details_dropped,
    within_budget: size <= config.max_snapshot_bytes,
  };

  let repo = &snapshot.key;
  if !report.within_budget {
    warn!(%repo, bytes = size, budget = config.max_snapshot_bytes, "snapshot still over budget after bounding");
  } else if size < bytes_before {
    info!(%repo, bytes_before, bytes_after = size, months_trimmed, details_dropped, "snapshot bounded");
  }

  (snapshot, report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{DateTime, Utc};
  use health_engine::types::{ContributorMetrics, MonthlyDetail, OpenrankMetrics};
  use health_engine::{MetricSeries, RepoKey};
  use serde_json::json;

  /// Node descriptor serializing to exactly 405 bytes.
  fn node(i: usize) -> serde_json::Value {
    json!([format!("id{:05}", i), format!("user-{:05}-{}", i, "x".repeat(380))])
  }

  fn graph_with(n: usize) -> CommunityOpenrankGraph {
    let nodes: Vec<_> = (0..n).map(node).collect();
    serde_json::from_value(json!({"meta": {"type": "community", "nodes": nodes}, "data": {}})).unwrap()
  }

  fn snapshot() -> RepoMetricsSnapshot {
    RepoMetricsSnapshot::empty(RepoKey::new("github", "acme", "widget"), DateTime::<Utc>::default())
  }

  #[test]
  fn node_fixture_size() {
    assert_eq!(serialized_size(&node(7)), 405);
  }

  #[test]
  fn graph_without_nodes_is_untouched() {
    let mut g: CommunityOpenrankGraph = serde_json::from_value(json!({"meta": {"type": "x"}})).unwrap();
    let before = g.clone();
    assert!(truncate_graph(&mut g, &BoundConfig::default()).is_none());
    assert_eq!(g, before);

    let mut g = CommunityOpenrankGraph::default();
    assert!(truncate_graph(&mut g, &BoundConfig::default()).is_none());
  }

  #[test]
  fn graph_under_budget_keeps_every_node() {
    let mut g = graph_with(100);
    let t = truncate_graph(&mut g, &BoundConfig::default()).unwrap();
    assert_eq!(t.nodes_after, 100);
    assert_eq!(t.iterations, 0);
    assert!(t.fits);
    assert_eq!(g.node_count(), 100);
  }

  #[test]
  fn oversized_graph_is_truncated_from_the_tail() {
    // 5000 * 405 bytes ≈ 2 MB; 4000 nodes still exceed 1.5 MiB, 3000 fit.
    let mut g = graph_with(5000);
    let t = truncate_graph(&mut g, &BoundConfig::default()).unwrap();
    assert_eq!(t.nodes_before, 5000);
    assert_eq!(t.nodes_after, 3000);
    assert!(t.fits);
    assert_eq!(g.node_count(), 3000);
    assert_eq!(g.nodes().unwrap()[0], node(0));
    assert_eq!(g.nodes().unwrap()[2999], node(2999));
    // Incremental accounting agrees with a full re-serialization.
    assert_eq!(serialized_size(&g), t.bytes_after);
    assert!(t.bytes_after <= BoundConfig::default().graph_budget_bytes);
  }

  #[test]
  fn single_oversized_node_gives_up_without_looping() {
    let config = BoundConfig {
      graph_budget_bytes: 100,
      ..BoundConfig::default()
    };
    let mut g = graph_with(1);
    let t = truncate_graph(&mut g, &config).unwrap();
    assert_eq!(t.nodes_after, 1);
    assert!(!t.fits);
    // 1000 → 500 → 250 → 125 → 62 (< 100): four halvings, then stop.
    assert_eq!(t.iterations, 4);
  }

  #[test]
  fn iteration_guard_bounds_degenerate_configs() {
    let config = BoundConfig {
      graph_budget_bytes: 10,
      initial_step: 1,
      min_step: 0,
      max_iterations: 50,
      ..BoundConfig::default()
    };
    let mut g = graph_with(500);
    let t = truncate_graph(&mut g, &config).unwrap();
    assert!(t.iterations <= 50);
    assert!(t.nodes_after <= 500);
  }

  #[test]
  fn small_snapshot_passes_through() {
    let mut s = snapshot();
    s.activity = Some((1..=9).map(|m| (format!("2024-0{}", m), m as f64)).collect());
    let (bounded, report) = bound_snapshot(s.clone(), &BoundConfig::default());
    assert_eq!(bounded, s);
    assert!(report.within_budget);
    assert_eq!(report.months_trimmed, 0);
    assert_eq!(report.bytes_before, report.bytes_after);
  }

  #[test]
  fn over_budget_snapshot_trims_oldest_months_then_details() {
    let mut s = snapshot();
    let history: MetricSeries = (0..48)
      .map(|i| (format!("{}-{:02}", 2020 + i / 12, i % 12 + 1), i as f64))
      .collect();
    s.activity = Some(history.clone());
    let details: MonthlyDetail = (0..48)
      .map(|i| (format!("{}-{:02}", 2020 + i / 12, i % 12 + 1), json!([["alice", 1.0]])))
      .collect();
    s.contributors = Some(ContributorMetrics {
      contributors: Some(history),
      details: Some(details),
      ..Default::default()
    });
    s.openrank = Some(OpenrankMetrics {
      community_openrank: Some(graph_with(10)),
      ..Default::default()
    });

    let config = BoundConfig {
      max_snapshot_bytes: 700,
      ..BoundConfig::default()
    };
    let (bounded, report) = bound_snapshot(s, &config);

    let activity = bounded.activity.as_ref().unwrap();
    assert_eq!(activity.len(), 12);
    assert_eq!(activity.get("2023-12"), Some(47.0));
    assert_eq!(activity.get("2022-12"), None);
    assert_eq!(report.months_trimmed, 36 * 3);
    assert_eq!(report.details_dropped, 1);
    assert!(bounded.contributors.as_ref().unwrap().details.is_none());
    // Categories survive even when still over budget.
    assert!(bounded.openrank.is_some());
    assert_eq!(report.bytes_after, serialized_size(&bounded));
    assert!(report.bytes_after < report.bytes_before);
  }
}
