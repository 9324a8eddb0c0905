//! Text generation providers.
//!
//! The [`TextGenerator`] trait is the only thing the content augmenter
//! needs from an LLM. Two HTTP implementations ship:
//!
//! | Config `provider` | Implementation | Endpoint |
//! |-------------------|----------------|----------|
//! | `"openai"` | [`OpenAIGenerator`] | `POST {url}/chat/completions` |
//! | `"gemini"` | [`GeminiGenerator`] | `POST {url}/models/{model}:generateContent` |
//!
//! Failures are classified into [`GenerationError`] so the caller can
//! decide whether a retry is worthwhile and how long to wait.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::config::GenerationConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. }
            | GenerationError::Timeout
            | GenerationError::Transport(_) => true,
            GenerationError::Service { status, .. } => *status >= 500,
            GenerationError::Malformed(_) => false,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }

    /// Delay suggested by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion. With `json` set, the service is asked for a
    /// single JSON object.
    async fn generate(&self, system: &str, user: &str, json: bool)
        -> Result<String, GenerationError>;
}

static RETRY_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry in ([0-9]+(?:\.[0-9]+)?)\s*s").expect("valid regex"));
static RETRY_DELAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""retryDelay"\s*:\s*"([0-9]+(?:\.[0-9]+)?)s""#).expect("valid regex")
});

/// Extract a server-suggested delay from an error message or body.
pub fn parse_retry_delay(text: &str) -> Option<Duration> {
    [&*RETRY_IN_RE, &*RETRY_DELAY_RE]
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .and_then(secs_to_duration)
}

/// `None` for negative, non-finite, or unrepresentable values.
fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

fn looks_like_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("quota") || lower.contains("resource_exhausted")
}

/// Turn a non-success HTTP response into a classified error.
async fn classify_failure(response: reqwest::Response) -> GenerationError {
    let status = response.status();
    let header_delay = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(secs_to_duration);
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 || looks_like_quota(&body) {
        return GenerationError::RateLimited {
            retry_after: header_delay.or_else(|| parse_retry_delay(&body)),
            message: body,
        };
    }
    GenerationError::Service {
        status: status.as_u16(),
        message: body,
    }
}

fn http_client(config: &GenerationConfig) -> Option<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| warn!(error = %e, "failed to build generation HTTP client"))
        .ok()
}

fn api_key(config: &GenerationConfig, default_env: &str) -> Option<String> {
    let var = config.api_key_env.as_deref().unwrap_or(default_env);
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            warn!(env = var, "generation API key not set; LLM content disabled");
            None
        }
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system: &str,
        user: &str,
        json: bool,
    ) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
        });
        if json {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Malformed("missing choices[0].message.content".into()))
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system: &str,
        user: &str,
        json: bool,
    ) -> Result<String, GenerationError> {
        let mut generation_config = serde_json::json!({
            "temperature": self.temperature,
            "maxOutputTokens": self.max_output_tokens,
        });
        if json {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }
        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [{"role": "user", "parts": [{"text": user}]}],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let parts = json
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                GenerationError::Malformed("missing candidates[0].content.parts".into())
            })?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();
        if text.is_empty() {
            return Err(GenerationError::Malformed("empty candidate text".into()));
        }
        Ok(text)
    }
}

/// Build the configured generator.
///
/// Returns `None` when generation is disabled or cannot be set up (for
/// example a missing API key); callers then use deterministic content.
pub fn create_generator(config: &GenerationConfig) -> Option<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "openai" => Some(Arc::new(OpenAIGenerator {
            model: config.model.clone().unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            url: config.url.clone().unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key: api_key(config, "OPENAI_API_KEY")?,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            client: http_client(config)?,
        })),
        "gemini" => Some(Arc::new(GeminiGenerator {
            model: config.model.clone().unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            url: config.url.clone().unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string()),
            api_key: api_key(config, "GEMINI_API_KEY")?,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            client: http_client(config)?,
        })),
        _ => None,
    }
}
