//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/syllabus.sqlite"
//! collection = "educational_resources"
//!
//! [ingest]
//! root = "./resources"
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! Every section except `[db]` may be omitted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use syllabus_core::assembler::MAX_RESOURCES_PER_TOPIC;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "educational_resources".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./resources")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override for HTTP providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_resources_per_topic")]
    pub resources_per_topic: usize,
    #[serde(default = "default_advanced_resources_per_topic")]
    pub advanced_resources_per_topic: usize,
    #[serde(default = "default_general_limit")]
    pub general_limit: usize,
    #[serde(default = "default_prompt_broad_limit")]
    pub prompt_broad_limit: i64,
    #[serde(default = "default_prompt_topic_limit")]
    pub prompt_topic_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            resources_per_topic: default_resources_per_topic(),
            advanced_resources_per_topic: default_advanced_resources_per_topic(),
            general_limit: default_general_limit(),
            prompt_broad_limit: default_prompt_broad_limit(),
            prompt_topic_limit: default_prompt_topic_limit(),
        }
    }
}

fn default_limit() -> i64 {
    10
}
fn default_resources_per_topic() -> usize {
    3
}
fn default_advanced_resources_per_topic() -> usize {
    5
}
fn default_general_limit() -> usize {
    5
}
fn default_prompt_broad_limit() -> i64 {
    50
}
fn default_prompt_topic_limit() -> i64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override, mainly for proxies and tests.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: f64,
    /// Added to a server-suggested retry delay.
    #[serde(default = "default_retry_padding_secs")]
    pub retry_padding_secs: f64,
    /// Upper bound on any single wait between attempts.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            api_key_env: None,
            max_attempts: default_max_attempts(),
            initial_backoff_secs: default_initial_backoff_secs(),
            retry_padding_secs: default_retry_padding_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            timeout_secs: default_generation_timeout_secs(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_secs() -> f64 {
    5.0
}
fn default_retry_padding_secs() -> f64 {
    2.0
}
fn default_max_backoff_secs() -> f64 {
    30.0
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_preview_chars() -> usize {
    syllabus_core::content::DEFAULT_PREVIEW_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Largest accepted value for any `[generation]` backoff setting.
const MAX_BACKOFF_LIMIT_SECS: f64 = 3600.0;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.db.collection.trim().is_empty() {
        anyhow::bail!("db.collection must not be empty");
    }

    if config.retrieval.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }
    let per_topic_range = 1..=MAX_RESOURCES_PER_TOPIC;
    if !per_topic_range.contains(&config.retrieval.resources_per_topic)
        || !per_topic_range.contains(&config.retrieval.advanced_resources_per_topic)
    {
        anyhow::bail!(
            "retrieval.resources_per_topic must be between 1 and {}",
            MAX_RESOURCES_PER_TOPIC
        );
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or gemini.",
            other
        ),
    }
    if config.generation.max_attempts == 0 {
        anyhow::bail!("generation.max_attempts must be >= 1");
    }
    let backoffs = [
        config.generation.initial_backoff_secs,
        config.generation.retry_padding_secs,
        config.generation.max_backoff_secs,
    ];
    if backoffs
        .iter()
        .any(|s| !s.is_finite() || *s < 0.0 || *s > MAX_BACKOFF_LIMIT_SECS)
    {
        anyhow::bail!(
            "generation backoff values must be between 0 and {} seconds",
            MAX_BACKOFF_LIMIT_SECS
        );
    }

    Ok(config)
}
