//! Curriculum assembly: topics, audience, and a time budget become a
//! deduplicated resource list with a non-overlapping schedule.
//!
//! For each topic the assembler runs one filtered retrieval (institution,
//! audience, topic as tag, preferred types), retrying without the
//! institution filter when nothing matches. One general retrieval for the
//! audience follows. Results are merged in discovery order, deduplicated
//! by id, and scheduled back to back:
//!
//! ```text
//! per_item = min(duration_hours * 60 / max(count, 1), 30)
//! start(i) = i * per_item
//! ```
//!
//! The schedule may under-fill the duration when there are few resources.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::error::RequestError;
use crate::models::{Curriculum, ResourceRecord, ScheduleItem, SearchFilters};
use crate::retriever::{dedupe_by_key, Retriever};

/// Upper bound on the minutes given to a single resource.
pub const MAX_ITEM_MINUTES: f64 = 30.0;

pub const DEFAULT_RESOURCES_PER_TOPIC: usize = 3;
/// Largest accepted `resources_per_topic`.
pub const MAX_RESOURCES_PER_TOPIC: usize = 100;
pub const DEFAULT_GENERAL_LIMIT: usize = 5;

fn default_duration_hours() -> f64 {
    2.0
}

/// Input to [`Assembler::assemble`].
#[derive(Debug, Clone, Deserialize)]
pub struct CurriculumRequest {
    pub institution: String,
    pub target_audience: Vec<String>,
    pub topics: Vec<String>,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: f64,
    #[serde(default)]
    pub preferred_types: Vec<String>,
    /// Overrides the assembler default when set.
    #[serde(default)]
    pub resources_per_topic: Option<usize>,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub institution_context: Option<String>,
    /// Request generated detailed content.
    #[serde(default)]
    pub use_advanced: bool,
}

impl CurriculumRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.institution.trim().is_empty() {
            return Err(RequestError::empty("institution"));
        }
        if non_blank(&self.target_audience).next().is_none() {
            return Err(RequestError::empty("target_audience"));
        }
        if non_blank(&self.topics).next().is_none() {
            return Err(RequestError::empty("topics"));
        }
        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(RequestError::out_of_range(
                "duration_hours",
                "must be a positive number of hours",
            ));
        }
        match self.resources_per_topic {
            Some(0) => {
                return Err(RequestError::out_of_range(
                    "resources_per_topic",
                    "must be >= 1",
                ))
            }
            Some(n) if n > MAX_RESOURCES_PER_TOPIC => {
                return Err(RequestError::out_of_range(
                    "resources_per_topic",
                    "must be <= 100",
                ))
            }
            _ => {}
        }
        Ok(())
    }
}

fn non_blank(values: &[String]) -> impl Iterator<Item = &str> {
    values.iter().map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub struct Assembler<'a> {
    retriever: Retriever<'a>,
    resources_per_topic: usize,
    general_limit: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(retriever: Retriever<'a>) -> Self {
        Self {
            retriever,
            resources_per_topic: DEFAULT_RESOURCES_PER_TOPIC,
            general_limit: DEFAULT_GENERAL_LIMIT,
        }
    }

    pub fn with_limits(mut self, resources_per_topic: usize, general_limit: usize) -> Self {
        self.resources_per_topic = resources_per_topic.clamp(1, MAX_RESOURCES_PER_TOPIC);
        self.general_limit = general_limit;
        self
    }

    pub async fn assemble(&self, request: &CurriculumRequest) -> Result<Curriculum> {
        request.validate()?;

        let topics: Vec<String> = non_blank(&request.topics).map(str::to_string).collect();
        let audience: Vec<String> = non_blank(&request.target_audience)
            .map(str::to_string)
            .collect();
        let audience_label = audience.join(", ");
        let per_topic = request
            .resources_per_topic
            .unwrap_or(self.resources_per_topic);

        let mut queries: Vec<String> = topics
            .iter()
            .map(|t| format!("{} activities for {} students", t, audience_label))
            .collect();
        queries.push(format!("AI education resources for {}", audience_label));
        let vectors = self.retriever.embed_queries(&queries).await?;

        let mut found: Vec<ResourceRecord> = Vec::new();
        for (topic, query_vec) in topics.iter().zip(&vectors) {
            let mut filters = SearchFilters {
                institution: vec![request.institution.clone()],
                target_audience: audience.clone(),
                tags: vec![topic.clone()],
                resource_type: request.preferred_types.clone(),
            };
            let fetch = i64::try_from(per_topic.saturating_mul(2)).unwrap_or(i64::MAX);
            let mut hits = self
                .retriever
                .search_by_vector(query_vec, fetch, &filters)
                .await?;
            if hits.is_empty() {
                debug!(topic = %topic, "no institution match, retrying without institution");
                filters.institution.clear();
                hits = self
                    .retriever
                    .search_by_vector(query_vec, fetch, &filters)
                    .await?;
            }
            debug!(topic = %topic, hits = hits.len(), "topic retrieval");
            found.extend(hits.into_iter().take(per_topic).map(|h| h.record));
        }

        if let Some(general_vec) = vectors.get(topics.len()) {
            let general_limit = i64::try_from(self.general_limit).unwrap_or(i64::MAX);
            let filters = SearchFilters {
                target_audience: audience.clone(),
                resource_type: request.preferred_types.clone(),
                ..Default::default()
            };
            let hits = self
                .retriever
                .search_by_vector(general_vec, general_limit, &filters)
                .await?;
            found.extend(hits.into_iter().map(|h| h.record));
        }

        let resources = dedupe_by_key(found, |r| r.id.clone());
        let schedule = build_schedule(&resources, request.duration_hours);

        Ok(Curriculum {
            institution: request.institution.trim().to_string(),
            target_audience: audience,
            topics,
            duration_hours: request.duration_hours,
            resources,
            schedule,
            detailed_content: None,
        })
    }
}

/// Lay resources out back to back, each capped at [`MAX_ITEM_MINUTES`].
pub fn build_schedule(resources: &[ResourceRecord], duration_hours: f64) -> Vec<ScheduleItem> {
    let count = resources.len().max(1) as f64;
    let per_item = (duration_hours * 60.0 / count).min(MAX_ITEM_MINUTES);

    resources
        .iter()
        .enumerate()
        .map(|(i, r)| ScheduleItem {
            resource_title: r.attributes.display_title().to_string(),
            start_minutes: i as f64 * per_item,
            duration_minutes: per_item,
        })
        .collect()
}
