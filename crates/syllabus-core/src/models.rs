//! Core data types for Syllabus.
//!
//! These types flow through every stage: the front-matter parser produces
//! [`ResourceRecord`]s, the index stores them, the retriever returns
//! [`SearchResult`]s, and the assembler packs them into a [`Curriculum`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::content::DetailedContent;

/// Set-valued attribute fields that filters can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeField {
    Institution,
    Tags,
    TargetAudience,
    Type,
    KeyConcepts,
}

impl AttributeField {
    pub const ALL: [AttributeField; 5] = [
        AttributeField::Institution,
        AttributeField::Tags,
        AttributeField::TargetAudience,
        AttributeField::Type,
        AttributeField::KeyConcepts,
    ];

    /// Column value used by persistent backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeField::Institution => "institution",
            AttributeField::Tags => "tags",
            AttributeField::TargetAudience => "target_audience",
            AttributeField::Type => "type",
            AttributeField::KeyConcepts => "key_concepts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// Lowercase and trim a filter or attribute token. Blank tokens are dropped.
pub fn normalize_token(raw: &str) -> Option<String> {
    let token = raw.trim().to_lowercase();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Typed metadata carried by every resource.
///
/// Set-valued fields hold normalized tokens only (see [`normalize_token`]).
/// Scalar fields keep their original casing for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Why the resource matters for the curriculum.
    #[serde(default)]
    pub relevance: Option<String>,
    /// Path relative to the ingestion root.
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub institution: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub target_audience: BTreeSet<String>,
    #[serde(default, rename = "type")]
    pub resource_type: BTreeSet<String>,
    #[serde(default)]
    pub key_concepts: BTreeSet<String>,
}

impl ResourceAttributes {
    pub fn set(&self, field: AttributeField) -> &BTreeSet<String> {
        match field {
            AttributeField::Institution => &self.institution,
            AttributeField::Tags => &self.tags,
            AttributeField::TargetAudience => &self.target_audience,
            AttributeField::Type => &self.resource_type,
            AttributeField::KeyConcepts => &self.key_concepts,
        }
    }

    pub fn set_mut(&mut self, field: AttributeField) -> &mut BTreeSet<String> {
        match field {
            AttributeField::Institution => &mut self.institution,
            AttributeField::Tags => &mut self.tags,
            AttributeField::TargetAudience => &mut self.target_audience,
            AttributeField::Type => &mut self.resource_type,
            AttributeField::KeyConcepts => &mut self.key_concepts,
        }
    }

    /// Insert a raw token into a set field, normalizing it first.
    pub fn insert(&mut self, field: AttributeField, raw: &str) {
        if let Some(token) = normalize_token(raw) {
            self.set_mut(field).insert(token);
        }
    }

    /// Iterate every `(field, token)` pair, in field order.
    pub fn tokens(&self) -> impl Iterator<Item = (AttributeField, &str)> + '_ {
        AttributeField::ALL
            .into_iter()
            .flat_map(move |f| self.set(f).iter().map(move |t| (f, t.as_str())))
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    pub fn display_author(&self) -> &str {
        if self.author.trim().is_empty() {
            "Unknown"
        } else {
            &self.author
        }
    }
}

/// A single indexed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Stable identifier derived from the source path.
    pub id: String,
    /// The searchable text that is embedded.
    pub text: String,
    /// Free-text body after the front matter.
    #[serde(default)]
    pub body: String,
    /// Present once the record has been embedded.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub attributes: ResourceAttributes,
}

/// A record plus its cosine distance to the query (lower is closer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: ResourceRecord,
    pub distance: f32,
}

impl SearchResult {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Structured filters. Values inside one field are OR-ed; fields are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub institution: Vec<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub resource_type: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.institution.is_empty()
            && self.target_audience.is_empty()
            && self.tags.is_empty()
            && self.resource_type.is_empty()
    }

    /// `(field, values)` pairs in a fixed order.
    pub fn fields(&self) -> [(AttributeField, &[String]); 4] {
        [
            (AttributeField::Institution, &self.institution),
            (AttributeField::TargetAudience, &self.target_audience),
            (AttributeField::Tags, &self.tags),
            (AttributeField::Type, &self.resource_type),
        ]
    }
}

/// One slot in a curriculum schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub resource_title: String,
    pub start_minutes: f64,
    pub duration_minutes: f64,
}

/// An assembled workshop curriculum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curriculum {
    pub institution: String,
    pub target_audience: Vec<String>,
    pub topics: Vec<String>,
    pub duration_hours: f64,
    pub resources: Vec<ResourceRecord>,
    pub schedule: Vec<ScheduleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_content: Option<DetailedContent>,
}
