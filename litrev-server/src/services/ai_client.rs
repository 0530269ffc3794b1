//! LLM client for translation and preclassification
//!
//! [`LanguageModel`] is the seam job workers call through; [`OpenAiClient`]
//! talks to any OpenAI-compatible `/chat/completions` endpoint, paced by a
//! governor rate limiter.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use litrev_common::config::AiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Article, Dimension};

/// Confidence recorded when the model omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("AI client not configured: {0}")]
    NotConfigured(String),
}

/// One model judgment for one dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Judgment {
    pub dimension_id: Uuid,
    pub value: String,
    pub confidence: f64,
    pub rationale: Option<String>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Translate `text` into `target_language`
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError>;

    /// Judge `article` on every dimension the model answers for
    async fn classify(&self, article: &Article, dimensions: &[Dimension]) -> Result<Vec<Judgment>, AiError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::NotConfigured("empty API key".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            rate_limiter,
        })
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, AiError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), truncate(&body, 500)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("Invalid completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AiError::Parse("Completion had no content".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let system = format!(
            "You translate academic text into {}. Reply with the translation only, \
             keeping technical terms accurate. If the text is already in {}, repeat it unchanged.",
            target_language, target_language
        );
        self.chat(&system, text).await
    }

    async fn classify(&self, article: &Article, dimensions: &[Dimension]) -> Result<Vec<Judgment>, AiError> {
        let raw = self.chat(CLASSIFY_SYSTEM_PROMPT, &classification_prompt(article, dimensions)).await?;
        parse_judgments(&raw, dimensions)
    }
}

const CLASSIFY_SYSTEM_PROMPT: &str = "You screen academic articles for a literature review. \
For each dimension, judge the article and answer with a JSON array only: \
[{\"dimension\": <name>, \"value\": <answer>, \"confidence\": <0..1>, \"rationale\": <one sentence>}]. \
Boolean dimensions take \"yes\" or \"no\"; categorical dimensions take one of the listed options.";

/// User prompt listing the article and the dimensions to judge
pub fn classification_prompt(article: &Article, dimensions: &[Dimension]) -> String {
    let title = article.title_translated.as_deref().unwrap_or(&article.title);
    let abstract_text = article
        .abstract_translated
        .as_deref()
        .or(article.abstract_text.as_deref())
        .unwrap_or("(no abstract)");

    let mut prompt = format!("Title: {}\nAbstract: {}\n\nDimensions:\n", title, abstract_text);
    for dimension in dimensions {
        prompt.push_str(&format!("- {} ({})", dimension.name, dimension.kind.as_str()));
        if !dimension.options.is_empty() {
            prompt.push_str(&format!(" options: {}", dimension.options.join(" | ")));
        }
        if !dimension.description.is_empty() {
            prompt.push_str(&format!(": {}", dimension.description));
        }
        prompt.push('\n');
    }
    prompt
}

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    dimension: String,
    value: serde_json::Value,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

fn value_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(true) => Some("yes".to_string()),
        serde_json::Value::Bool(false) => Some("no".to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map the model's JSON answer onto known dimensions
///
/// Unknown dimension names and values the dimension does not accept are
/// dropped; confidences are clamped to [0, 1].
pub fn parse_judgments(raw: &str, dimensions: &[Dimension]) -> Result<Vec<Judgment>, AiError> {
    let body = strip_code_fences(raw);
    let items: Vec<RawJudgment> = serde_json::from_str(body)
        .map_err(|e| AiError::Parse(format!("Expected a JSON array of judgments: {}", e)))?;

    let mut judgments: Vec<Judgment> = Vec::new();
    for item in items {
        let Some(dimension) = dimensions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(item.dimension.trim()))
        else {
            debug!(dimension = %item.dimension, "Ignoring judgment for unknown dimension");
            continue;
        };
        if judgments.iter().any(|j| j.dimension_id == dimension.id) {
            continue;
        }

        let value = match value_to_text(&item.value).map(|v| dimension.validate_value(&v)) {
            Some(Ok(value)) => value,
            _ => {
                warn!(dimension = %dimension.name, value = %item.value, "Ignoring invalid model value");
                continue;
            }
        };

        let confidence = item
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0);

        judgments.push(Judgment {
            dimension_id: dimension.id,
            value,
            confidence,
            rationale: item.rationale.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        });
    }

    Ok(judgments)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
