//! Metric Fetcher: one GET per upstream file, normalized into typed category bundles.
//!
//! Upstream layout: `{base}/{platform}/{owner}/{repo}/{file}.json`. A 404 or an empty payload
//! is absence; any other failure is `UpstreamUnavailable`.

use async_trait::async_trait;
use health_engine::types::{
  is_month_key, AttentionMetrics, CodeChangeMetrics, ContributorMetrics, IssueMetrics, MonthlyDetail,
  OpenrankMetrics, PullRequestMetrics,
};
use health_engine::{Category, CategoryMetrics, CommunityOpenrankGraph, MetricSeries, RepoKey};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::UpstreamUnavailable;

/// Source of raw upstream metric files.
#[async_trait]
pub trait MetricSource: Send + Sync {
  /// Fetch one file by stem (e.g. `issues_new`). `Ok(None)` when upstream has no data for it.
  async fn fetch_file(&self, key: &RepoKey, file: &str) -> Result<Option<Value>, UpstreamUnavailable>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

pub struct HttpMetricSource {
  client: Client,
  base_url: String,
}

impl HttpMetricSource {
  pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
    let client = Client::builder().timeout(config.request_timeout).build()?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
    })
  }

  pub fn file_url(&self, key: &RepoKey, file: &str) -> String {
    format!(
      "{}/{}/{}/{}/{}.json",
      self.base_url, key.platform, key.owner, key.repo, file
    )
  }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
  async fn fetch_file(&self, key: &RepoKey, file: &str) -> Result<Option<Value>, UpstreamUnavailable> {
    let url = self.file_url(key, file);
    let response = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|source| UpstreamUnavailable::Transport {
        url: url.clone(),
        source,
      })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      debug!(%url, "no upstream data");
      return Ok(None);
    }
    if !status.is_success() {
      return Err(UpstreamUnavailable::status(url, status.as_u16()));
    }

    let body = response
      .bytes()
      .await
      .map_err(|source| UpstreamUnavailable::Transport {
        url: url.clone(),
        source,
      })?;
    parse_payload(&url, &body)
  }
}

/// Decode a 2xx body. Blank bodies, `null`, `{}` and `[]` are absence.
pub fn parse_payload(url: &str, body: &[u8]) -> Result<Option<Value>, UpstreamUnavailable> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(None);
  }
  let value: Value =
    serde_json::from_slice(body).map_err(|e| UpstreamUnavailable::payload(url, e.to_string()))?;
  let empty = match &value {
    Value::Null => true,
    Value::Object(m) => m.is_empty(),
    Value::Array(a) => a.is_empty(),
    _ => false,
  };
  Ok(if empty { None } else { Some(value) })
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Month-keyed numbers only. Duration files (`{avg, levels, quantile_N}`) collapse to `avg`.
pub fn normalize_series(value: Value) -> Option<MetricSeries> {
  let Value::Object(mut map) = value else {
    return None;
  };
  if let Some(Value::Object(avg)) = map.remove("avg") {
    return normalize_series(Value::Object(avg));
  }
  let series: MetricSeries = map
    .into_iter()
    .filter(|(k, _)| is_month_key(k))
    .filter_map(|(k, v)| v.as_f64().map(|v| (k, v)))
    .collect();
  (!series.is_empty()).then_some(series)
}

/// Month-keyed pass-through document.
pub fn normalize_detail(value: Value) -> Option<MonthlyDetail> {
  let Value::Object(map) = value else {
    return None;
  };
  let detail: MonthlyDetail = map.into_iter().filter(|(k, _)| is_month_key(k)).collect();
  (!detail.is_empty()).then_some(detail)
}

struct FileReader<'a> {
  source: &'a dyn MetricSource,
  key: &'a RepoKey,
}

impl FileReader<'_> {
  async fn series(&self, file: &str) -> Result<Option<MetricSeries>, UpstreamUnavailable> {
    Ok(self.source.fetch_file(self.key, file).await?.and_then(normalize_series))
  }

  async fn detail(&self, file: &str) -> Result<Option<MonthlyDetail>, UpstreamUnavailable> {
    Ok(self.source.fetch_file(self.key, file).await?.and_then(normalize_detail))
  }

  async fn graph(&self, file: &str) -> Result<Option<CommunityOpenrankGraph>, UpstreamUnavailable> {
    match self.source.fetch_file(self.key, file).await? {
      Some(value @ Value::Object(_)) => serde_json::from_value(value)
        .map(Some)
        .map_err(|e| UpstreamUnavailable::payload(format!("{}/{}", self.key, file), e.to_string())),
      _ => Ok(None),
    }
  }
}

/// Fetch every file of one category. `Ok(None)` when none of them had data.
pub async fn fetch_category(
  source: &dyn MetricSource,
  category: Category,
  key: &RepoKey,
) -> Result<Option<CategoryMetrics>, UpstreamUnavailable> {
  let f = FileReader { source, key };

  let metrics = match category {
    Category::Activity => f.series("activity").await?.map(CategoryMetrics::Activity),
    Category::Issues => {
      let m = IssueMetrics {
        new: f.series("issues_new").await?,
        closed: f.series("issues_closed").await?,
        comments: f.series("issue_comments").await?,
        age: f.series("issue_age").await?,
        response_time: f.series("issue_response_time").await?,
        resolution_duration: f.series("issue_resolution_duration").await?,
      };
      (m != IssueMetrics::default()).then(|| CategoryMetrics::Issues(m))
    }
    Category::PullRequests => {
      let m = PullRequestMetrics {
        change_requests: f.series("change_requests").await?,
        reviews: f.series("change_request_reviews").await?,
        accepted: f.series("change_requests_accepted").await?,
        age: f.series("change_request_age").await?,
        response_time: f.series("change_request_response_time").await?,
        resolution_duration: f.series("change_requests_resolution_duration").await?,
      };
      (m != PullRequestMetrics::default()).then(|| CategoryMetrics::PullRequests(m))
    }
    Category::CodeChanges => {
      let m = CodeChangeMetrics {
        add_lines: f.series("code_change_lines_add").await?,
        remove_lines: f.series("code_change_lines_remove").await?,
        sum_lines: f.series("code_change_lines_sum").await?,
      };
      (m != CodeChangeMetrics::default()).then(|| CategoryMetrics::CodeChanges(m))
    }
    Category::Contributors => {
      let m = ContributorMetrics {
        contributors: f.series("contributors").await?,
        details: f.detail("contributors_detail").await?,
        new_contributors: f.series("new_contributors").await?,
        inactive_contributors: f.series("inactive_contributors").await?,
        bus_factor: f.series("bus_factor").await?,
        absence_factor: f.series("contributor_absence_factor").await?,
      };
      (m != ContributorMetrics::default()).then(|| CategoryMetrics::Contributors(m))
    }
    Category::Openrank => {
      let m = OpenrankMetrics {
        openrank: f.series("openrank").await?,
        details: f.detail("openrank_detail").await?,
        community_openrank: f.graph("community_openrank").await?,
        community_details: f.detail("community_openrank_detail").await?,
      };
      (m != OpenrankMetrics::default()).then(|| CategoryMetrics::Openrank(m))
    }
    Category::Attention => {
      let m = AttentionMetrics {
        stars: f.series("stars").await?,
        technical_fork: f.series("technical_fork").await?,
      };
      (m != AttentionMetrics::default()).then(|| CategoryMetrics::Attention(m))
    }
  };

  if metrics.is_none() {
    debug!(repo = %key, %category, "category has no data");
  }
  Ok(metrics)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// In-memory source: files present in the map are served, `failing` files error, the rest 404.
  #[derive(Default)]
  struct FakeSource {
    files: HashMap<String, Value>,
    failing: Vec<String>,
    requested: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl MetricSource for FakeSource {
    async fn fetch_file(&self, _key: &RepoKey, file: &str) -> Result<Option<Value>, UpstreamUnavailable> {
      self.requested.lock().unwrap().push(file.to_string());
      if self.failing.iter().any(|f| f == file) {
        return Err(UpstreamUnavailable::status(file, 503));
      }
      Ok(self.files.get(file).cloned())
    }
  }

  fn key() -> RepoKey {
    RepoKey::new("github", "acme", "widget")
  }

  #[test]
  fn file_url_shape() {
    let source = HttpMetricSource::new(&SourceConfig {
      base_url: "https://metrics.example/".into(),
      ..SourceConfig::default()
    })
    .unwrap();
    assert_eq!(
      source.file_url(&key(), "issues_new"),
      "https://metrics.example/github/acme/widget/issues_new.json"
    );
  }

  #[test]
  fn parse_payload_treats_empty_as_absent() {
    assert!(parse_payload("u", b"").unwrap().is_none());
    assert!(parse_payload("u", b"  \n").unwrap().is_none());
    assert!(parse_payload("u", b"{}").unwrap().is_none());
    assert!(parse_payload("u", b"[]").unwrap().is_none());
    assert!(parse_payload("u", b"null").unwrap().is_none());
    assert!(parse_payload("u", br#"{"2024-01": 1}"#).unwrap().is_some());
  }

  #[test]
  fn parse_payload_rejects_garbage() {
    let err = parse_payload("https://x/a.json", b"<html>oops</html>").unwrap_err();
    assert!(err.to_string().contains("https://x/a.json"));
  }

  #[test]
  fn normalize_keeps_only_months() {
    let s = normalize_series(json!({
      "2023": 120.0, "2023Q4": 30.0, "2023-12": 10.0, "2024-01": 12.5, "2021-10-raw": 3.0, "2024-02": "n/a"
    }))
    .unwrap();
    assert_eq!(s.len(), 2);
    assert_eq!(s.get("2024-01"), Some(12.5));
  }

  #[test]
  fn normalize_uses_avg_of_duration_files() {
    let s = normalize_series(json!({
      "avg": {"2024-01": 4.0, "2024": 4.0},
      "levels": {"2024-01": [1, 2, 3]},
      "quantile_0": {"2024-01": 1.0}
    }))
    .unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(s.get("2024-01"), Some(4.0));
  }

  #[test]
  fn normalize_non_object_or_yearly_only_is_absent() {
    assert!(normalize_series(json!([1, 2, 3])).is_none());
    assert!(normalize_series(json!({"2023": 1.0})).is_none());
    assert!(normalize_detail(json!("x")).is_none());
  }

  #[tokio::test]
  async fn missing_file_leaves_only_that_field_absent() {
    let mut source = FakeSource::default();
    source.files.insert("issues_closed".into(), json!({"2024-01": 3}));
    let metrics = fetch_category(&source, Category::Issues, &key()).await.unwrap();
    match metrics {
      Some(CategoryMetrics::Issues(m)) => {
        assert!(m.new.is_none());
        assert_eq!(m.closed.unwrap().get("2024-01"), Some(3.0));
      }
      other => panic!("unexpected {:?}", other),
    }
    assert_eq!(source.requested.lock().unwrap().len(), 6);
  }

  #[tokio::test]
  async fn category_without_any_data_is_none() {
    let source = FakeSource::default();
    for category in Category::ALL {
      assert!(fetch_category(&source, category, &key()).await.unwrap().is_none());
    }
  }

  #[tokio::test]
  async fn upstream_failure_propagates() {
    let source = FakeSource {
      failing: vec!["change_requests_accepted".into()],
      ..Default::default()
    };
    let err = fetch_category(&source, Category::PullRequests, &key()).await.unwrap_err();
    assert!(matches!(err, UpstreamUnavailable::Status { status: 503, .. }));
  }

  #[tokio::test]
  async fn openrank_graph_and_details_are_decoded() {
    let mut source = FakeSource::default();
    source.files.insert(
      "community_openrank".into(),
      json!({"meta": {"nodes": [["1", "alice"], ["2", "bob"]]}, "data": {"2024-01": []}}),
    );
    source
      .files
      .insert("openrank_detail".into(), json!({"2024-01": [["alice", 1.2]], "2024": []}));
    let metrics = fetch_category(&source, Category::Openrank, &key()).await.unwrap();
    let Some(CategoryMetrics::Openrank(m)) = metrics else {
      panic!("expected openrank metrics");
    };
    assert_eq!(m.community_openrank.unwrap().node_labels(5), vec!["alice", "bob"]);
    let details = m.details.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details.get("2024-01"), Some(&json!([["alice", 1.2]])));
    assert!(details.get("2024").is_none());
    assert!(m.openrank.is_none());
  }

  /// Plain HTTP/1.1 server answering each request by the file name at the end of its path.
  /// Unlisted files get a 404.
  async fn serve(routes: Vec<(&'static str, &'static str, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      while let Ok((mut socket, _)) = listener.accept().await {
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap_or(0);
        let request = String::from_utf8_lossy(&buf[..n]);
        let path = request.split_whitespace().nth(1).unwrap_or("").to_string();
        let (status, body) = routes
          .iter()
          .find(|(file, _, _)| path.ends_with(&format!("/{}.json", file)))
          .map(|(_, status, body)| (*status, *body))
          .unwrap_or(("404 Not Found", ""));
        let response = format!(
          "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
          status,
          body.len(),
          body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
      }
    });
    format!("http://{}", addr)
  }

  #[tokio::test]
  async fn http_status_mapping() {
    let base_url = serve(vec![
      ("issues_closed", "500 Internal Server Error", "oops"),
      ("issue_comments", "200 OK", "{}"),
      ("activity", "200 OK", r#"{"2024-01": 3.5}"#),
    ])
    .await;
    let source = HttpMetricSource::new(&SourceConfig {
      base_url,
      ..SourceConfig::default()
    })
    .unwrap();

    // 404 is absence, not an error.
    assert!(source.fetch_file(&key(), "issues_new").await.unwrap().is_none());

    let err = source.fetch_file(&key(), "issues_closed").await.unwrap_err();
    assert!(matches!(err, UpstreamUnavailable::Status { status: 500, .. }));
    assert!(err.to_string().contains("/github/acme/widget/issues_closed.json"));

    // 2xx with an empty object is absence too.
    assert!(source.fetch_file(&key(), "issue_comments").await.unwrap().is_none());

    let value = source.fetch_file(&key(), "activity").await.unwrap().unwrap();
    assert_eq!(value, json!({"2024-01": 3.5}));
  }
}
