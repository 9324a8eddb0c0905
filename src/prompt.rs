//! Prompt-driven generation: free-form request in, cited markdown out.
//!
//! Retrieval embeds the prompt and its extracted topics together, then
//! runs one broad search over the whole prompt and one narrower search per
//! topic. Results are merged keeping the first hit per record id, then
//! collapsed again by source file (or title) so the same resource is never
//! cited twice.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use syllabus_core::content::{cite_resources, CitedResource};
use syllabus_core::error::RequestError;
use syllabus_core::keywords::TopicExtractor;
use syllabus_core::models::{SearchFilters, SearchResult};
use syllabus_core::retriever::{dedupe_by_key, Retriever};

use crate::augment::ContentAugmenter;

const NO_RESOURCES: &str = "No relevant resources found in the database. \
                            Please try a different prompt or add more resources.";

fn default_max_tokens() -> u32 {
    4096
}
fn default_use_llm() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: default_max_tokens(),
            use_llm: true,
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::empty("prompt"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptResponse {
    pub content: Option<String>,
    pub resources: Vec<CitedResource>,
    pub num_resources_used: usize,
    pub prompt: String,
    pub llm_used: bool,
    pub quota_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Search limits for prompt retrieval.
#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    pub broad: i64,
    pub per_topic: i64,
}

/// Broad search plus per-topic searches, merged and de-duplicated.
///
/// The prompt and its topics are embedded in one provider call. Failure of
/// that call or of the broad search is an error. A failing topic search is
/// logged and skipped.
pub async fn gather_resources(
    retriever: &Retriever<'_>,
    extractor: &dyn TopicExtractor,
    prompt: &str,
    limits: PromptLimits,
) -> Result<Vec<SearchResult>> {
    if prompt.trim().is_empty() {
        return Ok(Vec::new());
    }
    let none = SearchFilters::default();

    let topics: Vec<String> = extractor
        .extract(prompt)
        .into_iter()
        .filter(|t| t.trim().chars().count() > 2)
        .collect();
    debug!(?topics, "prompt topics");

    let queries: Vec<String> = std::iter::once(prompt.to_string())
        .chain(topics.iter().cloned())
        .collect();
    let vectors = retriever.embed_queries(&queries).await?;
    let (broad, per_topic) = vectors
        .split_first()
        .ok_or_else(|| anyhow!("no embedding returned for prompt"))?;

    let mut merged = retriever
        .search_by_vector(broad, limits.broad, &none)
        .await?;
    for (topic, vector) in topics.iter().zip(per_topic) {
        match retriever
            .search_by_vector(vector, limits.per_topic, &none)
            .await
        {
            Ok(results) => merged.extend(results),
            Err(e) => warn!(topic = %topic, error = %e, "topic search failed"),
        }
    }

    let by_id = dedupe_by_key(merged, |r| r.record.id.clone());
    let found = by_id.len();
    let unique = dedupe_by_key(by_id, |r| {
        let a = &r.record.attributes;
        if !a.file_path.is_empty() {
            a.file_path.clone()
        } else if !a.title.trim().is_empty() {
            a.title.trim().to_string()
        } else {
            r.record.id.clone()
        }
    });
    if unique.len() < found {
        debug!(removed = found - unique.len(), "collapsed duplicate resources");
    }
    Ok(unique)
}

/// Answer a prompt request end to end.
pub async fn generate_from_prompt(
    retriever: &Retriever<'_>,
    extractor: &dyn TopicExtractor,
    augmenter: &ContentAugmenter,
    request: &PromptRequest,
    limits: PromptLimits,
) -> Result<PromptResponse> {
    let results = gather_resources(retriever, extractor, &request.prompt, limits).await?;

    if results.is_empty() {
        return Ok(PromptResponse {
            prompt: request.prompt.clone(),
            error: Some(NO_RESOURCES.to_string()),
            ..Default::default()
        });
    }
    info!(resources = results.len(), "prompt resources gathered");

    let outcome = augmenter
        .compose_markdown(&request.prompt, &results, request.use_llm)
        .await;

    Ok(PromptResponse {
        content: Some(outcome.content),
        resources: cite_resources(&results),
        num_resources_used: results.len(),
        prompt: request.prompt.clone(),
        llm_used: outcome.llm_used,
        quota_error: outcome.quota_error,
        note: outcome.note,
        error: None,
    })
}
