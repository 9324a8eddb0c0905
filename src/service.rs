//! The application service.
//!
//! [`Syllabus`] is built once at startup and owns everything a request
//! needs: the index, the embedding provider, and the content augmenter.
//! The CLI calls it directly and the HTTP server shares it through axum
//! state.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use syllabus_core::assembler::{Assembler, CurriculumRequest};
use syllabus_core::embedding::EmbeddingProvider;
use syllabus_core::error::RequestError;
use syllabus_core::keywords::HeuristicTopicExtractor;
use syllabus_core::models::{Curriculum, ResourceRecord, SearchFilters, SearchResult};
use syllabus_core::retriever::Retriever;
use syllabus_core::store::ResourceIndex;

use crate::augment::ContentAugmenter;
use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::ingest::{ingest_root, IngestReport};
use crate::prompt::{self, PromptLimits, PromptRequest, PromptResponse};
use crate::sqlite_store::{drop_collection, SqliteIndex};

fn default_search_limit() -> i64 {
    10
}

/// Query boundary input.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub resource_type: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: i64) -> Self {
        Self {
            query: query.into(),
            limit,
            institution: None,
            target_audience: Vec::new(),
            tags: Vec::new(),
            resource_type: Vec::new(),
        }
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            institution: self.institution.iter().cloned().collect(),
            target_audience: self.target_audience.clone(),
            tags: self.tags.clone(),
            resource_type: self.resource_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results_count: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupeReport {
    pub scanned: usize,
    pub duplicates: Vec<String>,
    pub removed: usize,
    pub dry_run: bool,
}

/// Identity used to spot the same resource ingested under two paths.
fn content_identity(record: &ResourceRecord) -> String {
    let a = &record.attributes;
    let title = a.title.trim().to_lowercase();
    if title.is_empty() {
        format!("path:{}", a.file_path)
    } else {
        format!("title:{}|author:{}", title, a.author.trim().to_lowercase())
    }
}

pub struct Syllabus {
    config: Config,
    index: Arc<dyn ResourceIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    augmenter: ContentAugmenter,
}

impl Syllabus {
    /// Connect to the database, load the embedding model, and open the
    /// configured collection. Any failure here is fatal.
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with(config, false).await
    }

    /// Like [`open`](Self::open), optionally dropping the collection first.
    pub async fn open_with(config: Config, reset: bool) -> Result<Self> {
        let pool = db::connect(&config.db).await?;
        let embedder = create_provider(&config.embedding).await?;

        if reset {
            let removed = drop_collection(&pool, &config.db.collection).await?;
            info!(collection = %config.db.collection, removed, "collection reset");
        }

        let index = SqliteIndex::open(
            pool,
            &config.db.collection,
            embedder.model_name(),
            embedder.dims(),
        )
        .await?;
        let augmenter = ContentAugmenter::from_config(&config.generation);

        Ok(Self::from_parts(config, Arc::new(index), embedder, augmenter))
    }

    pub fn from_parts(
        config: Config,
        index: Arc<dyn ResourceIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        augmenter: ContentAugmenter,
    ) -> Self {
        Self {
            config,
            index,
            embedder,
            augmenter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &dyn ResourceIndex {
        self.index.as_ref()
    }

    fn retriever(&self) -> Retriever<'_> {
        Retriever::new(self.index.as_ref(), self.embedder.as_ref())
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(RequestError::empty("query").into());
        }
        let results = self
            .retriever()
            .search(&request.query, request.limit, &request.filters())
            .await?;
        Ok(SearchResponse {
            query: request.query.clone(),
            results_count: results.len(),
            results,
        })
    }

    /// Assemble a curriculum; with `use_advanced` it also gets detailed
    /// content, generated or fallback.
    pub async fn curriculum(&self, request: &CurriculumRequest) -> Result<Curriculum> {
        let retrieval = &self.config.retrieval;
        let per_topic = if request.use_advanced {
            retrieval.advanced_resources_per_topic
        } else {
            retrieval.resources_per_topic
        };

        let mut curriculum = Assembler::new(self.retriever())
            .with_limits(per_topic, retrieval.general_limit)
            .assemble(request)
            .await?;
        info!(
            topics = curriculum.topics.len(),
            resources = curriculum.resources.len(),
            "curriculum assembled"
        );

        if request.use_advanced {
            let content = self
                .augmenter
                .augment(
                    &curriculum,
                    &request.learning_objectives,
                    request.institution_context.as_deref(),
                )
                .await;
            curriculum.detailed_content = Some(content);
        }
        Ok(curriculum)
    }

    pub async fn generate_from_prompt(&self, request: &PromptRequest) -> Result<PromptResponse> {
        request.validate()?;
        let retrieval = &self.config.retrieval;
        prompt::generate_from_prompt(
            &self.retriever(),
            &HeuristicTopicExtractor,
            &self.augmenter,
            request,
            PromptLimits {
                broad: retrieval.prompt_broad_limit,
                per_topic: retrieval.prompt_topic_limit,
            },
        )
        .await
    }

    pub async fn resources(&self, limit: Option<usize>) -> Result<Vec<ResourceRecord>> {
        self.index.list_all(limit).await
    }

    /// Ingest from `root`, or the configured root when `None`.
    pub async fn ingest(&self, root: Option<&Path>, dry_run: bool) -> Result<IngestReport> {
        let root = root.unwrap_or(self.config.ingest.root.as_path());
        ingest_root(
            &self.config.ingest,
            self.config.embedding.batch_size,
            self.index.as_ref(),
            self.embedder.as_ref(),
            root,
            dry_run,
        )
        .await
    }

    /// Delete every record after the first with the same content identity.
    pub async fn remove_duplicates(&self, dry_run: bool) -> Result<DedupeReport> {
        let records = self.index.list_all(None).await?;
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = records
            .iter()
            .filter(|r| !seen.insert(content_identity(r)))
            .map(|r| r.id.clone())
            .collect();

        let removed = if dry_run || duplicates.is_empty() {
            0
        } else {
            self.index.delete(&duplicates).await?
        };
        info!(scanned = records.len(), duplicates = duplicates.len(), removed, "dedupe finished");

        Ok(DedupeReport {
            scanned: records.len(),
            duplicates,
            removed,
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_core::frontmatter::parse_resource;
    use syllabus_core::store::memory::InMemoryIndex;
    use syllabus_core::store::upsert_records;

    use crate::config::parse_config;
    use crate::testing::KeywordEmbedder;

    async fn service(files: &[(&str, &str)]) -> Syllabus {
        let config = parse_config("[db]\npath = \"unused.sqlite\"\n").unwrap();
        let index = Arc::new(InMemoryIndex::new());
        let embedder = Arc::new(KeywordEmbedder::default());
        let records = files
            .iter()
            .filter_map(|(path, content)| parse_resource(path, content))
            .collect();
        upsert_records(index.as_ref(), embedder.as_ref(), records)
            .await
            .unwrap();
        Syllabus::from_parts(config, index, embedder, ContentAugmenter::disabled())
    }

    #[tokio::test]
    async fn test_blank_search_is_request_error() {
        let svc = service(&[]).await;
        let err = svc.search(&SearchRequest::new("  ", 5)).await.unwrap_err();
        assert!(err.downcast_ref::<RequestError>().is_some());
    }

    #[tokio::test]
    async fn test_search_applies_institution_filter() {
        let svc = service(&[
            ("a.md", "---\ntitle: A\ninstitution: MIT\n---\nethics"),
            ("b.md", "---\ntitle: B\ninstitution: Stanford\n---\nethics"),
        ])
        .await;
        let mut request = SearchRequest::new("ethics", 10);
        request.institution = Some("mit".into());

        let response = svc.search(&request).await.unwrap();
        assert_eq!(response.results_count, 1);
        assert_eq!(response.results[0].record.attributes.title, "A");
    }

    #[tokio::test]
    async fn test_advanced_curriculum_gets_fallback_content() {
        let svc = service(&[(
            "a.md",
            "---\ntitle: Bias Lab\ntags: [bias]\ntarget_audience: [undergraduate]\n---\nbias",
        )])
        .await;
        let request: CurriculumRequest = serde_json::from_value(serde_json::json!({
            "institution": "Ethika",
            "target_audience": ["undergraduate"],
            "topics": ["bias"],
            "use_advanced": true
        }))
        .unwrap();

        let curriculum = svc.curriculum(&request).await.unwrap();
        assert_eq!(curriculum.resources.len(), 1);
        assert!(curriculum.detailed_content.is_some());

        let plain = CurriculumRequest {
            use_advanced: false,
            ..request
        };
        assert!(svc.curriculum(&plain).await.unwrap().detailed_content.is_none());
    }

    #[tokio::test]
    async fn test_remove_duplicates_keeps_first() {
        let svc = service(&[
            ("a.md", "---\ntitle: Bias Lab\nauthor: Kim\n---\none"),
            ("copy/a.md", "---\ntitle: bias lab\nauthor: kim\n---\ntwo"),
            ("c.md", "---\ntitle: Other\n---\nthree"),
        ])
        .await;

        let preview = svc.remove_duplicates(true).await.unwrap();
        assert_eq!(preview.duplicates.len(), 1);
        assert_eq!(preview.removed, 0);
        assert_eq!(svc.index().count().await.unwrap(), 3);

        let report = svc.remove_duplicates(false).await.unwrap();
        assert_eq!(report.removed, 1);
        let remaining = svc.resources(None).await.unwrap();
        let paths: Vec<&str> = remaining.iter().map(|r| r.attributes.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "c.md"]);
    }
}
