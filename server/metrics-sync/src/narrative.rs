//! Narrative Generator boundary: prompt in, free-form analysis text out.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::NarrativeConfig;
use crate::error::GenerationUnavailable;

const SYSTEM_PROMPT: &str = "You are an expert in open source project health. Analyze the project \
information you are given, assess its health and give concrete recommendations.";

static SCORE_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"<!--score:(\d+)-->").expect("valid score marker regex"));

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
  async fn analyze(&self, prompt: &str) -> Result<String, GenerationUnavailable>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsNarrator {
  client: Client,
  config: NarrativeConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: [ChatMessage<'a>; 2],
  temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
  content: Option<String>,
}

impl ChatCompletionsNarrator {
  pub fn new(config: NarrativeConfig) -> Result<Self, GenerationUnavailable> {
    if config.api_key.is_none() {
      warn!("no narrative API key configured, narrative reports are unavailable");
    } else {
      info!(model = %config.model, "narrative generation enabled");
    }
    let client = Client::builder().timeout(config.request_timeout).build()?;
    Ok(Self { client, config })
  }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsNarrator {
  async fn analyze(&self, prompt: &str) -> Result<String, GenerationUnavailable> {
    let api_key = self.config.api_key.as_deref().ok_or(GenerationUnavailable::MissingApiKey)?;
    let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
    let request = ChatRequest {
      model: &self.config.model,
      messages: [
        ChatMessage {
          role: "system",
          content: SYSTEM_PROMPT,
        },
        ChatMessage {
          role: "user",
          content: prompt,
        },
      ],
      temperature: self.config.temperature,
    };

    debug!(%url, prompt_bytes = prompt.len(), "requesting narrative");
    let response = self.client.post(&url).bearer_auth(api_key).json(&request).send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(GenerationUnavailable::Status {
        status: status.as_u16(),
        body,
      });
    }

    let reply: ChatResponse = response.json().await?;
    reply
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .filter(|text| !text.trim().is_empty())
      .ok_or(GenerationUnavailable::EmptyResponse)
  }
}

/// Analysis text with the self-reported score marker removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
  pub analysis: String,
  /// Score from the `<!--score:NN-->` marker; 0 when the marker is missing.
  pub score: u32,
}

pub fn parse_narrative(text: &str) -> Narrative {
  let score = SCORE_MARKER
    .captures(text)
    .and_then(|c| c[1].parse().ok())
    .unwrap_or(0);
  let analysis = SCORE_MARKER.replace(text, "").trim_end().to_string();
  Narrative { analysis, score }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn marker_is_parsed_and_stripped() {
    let n = parse_narrative("## Summary\nHealthy project.\n<!--score:82-->\n");
    assert_eq!(n.score, 82);
    assert_eq!(n.analysis, "## Summary\nHealthy project.");
  }

  #[test]
  fn missing_marker_scores_zero() {
    let n = parse_narrative("No score given.");
    assert_eq!(n.score, 0);
    assert_eq!(n.analysis, "No score given.");
  }

  #[test]
  fn only_first_marker_counts() {
    let n = parse_narrative("a <!--score:40--> b <!--score:90-->");
    assert_eq!(n.score, 40);
    assert_eq!(n.analysis, "a  b <!--score:90-->");
  }

  #[test]
  fn unparseable_marker_scores_zero() {
    let n = parse_narrative("x <!--score:99999999999999999999-->");
    assert_eq!(n.score, 0);
    assert_eq!(n.analysis, "x");
  }

  #[test]
  fn request_body_shape() {
    let request = ChatRequest {
      model: "m",
      messages: [
        ChatMessage {
          role: "system",
          content: "s",
        },
        ChatMessage {
          role: "user",
          content: "p",
        },
      ],
      temperature: 0.5,
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["model"], "m");
    assert_eq!(value["messages"][1]["role"], "user");
    assert_eq!(value["temperature"], 0.5);
  }

  #[tokio::test]
  async fn missing_key_is_unavailable() {
    let narrator = ChatCompletionsNarrator::new(NarrativeConfig::default()).unwrap();
    let err = narrator.analyze("prompt").await.unwrap_err();
    assert!(matches!(err, GenerationUnavailable::MissingApiKey));
  }

  #[test]
  fn reply_without_choices_deserializes() {
    let reply: ChatResponse = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
    assert!(reply.choices.is_empty());
  }
}
