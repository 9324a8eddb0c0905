//! Front-matter parsing: resource files become [`ResourceRecord`]s.
//!
//! A resource file is optional `---`-delimited YAML front matter followed by
//! a free-text body. Parsing never fails: malformed YAML degrades to an
//! empty attribute set with the whole file as body, and files that carry
//! neither attributes nor body yield `None`.
//!
//! The searchable text that gets embedded is assembled in a fixed order:
//!
//! ```text
//! Title: ...
//! Author: ...
//! Relevance: ...
//! Tags: a, b
//! Target Audience: ...
//! Type: ...
//! Key Concepts: ...
//! Content: <body>
//! ```
//!
//! Lines whose value is absent are omitted.

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::models::{AttributeField, ResourceAttributes, ResourceRecord};

const RELEVANCE_KEYS: [&str; 2] = ["relevance_to_ethika", "relevance"];
const KEY_CONCEPT_KEYS: [&str; 2] = ["key_concept", "key_concepts"];

/// Derive the stable record id for a path relative to the ingestion root.
///
/// Path separators are normalized so the same tree yields the same ids on
/// every platform.
pub fn resource_id(relative_path: &str) -> String {
    let normalized = relative_path.replace('\\', "/");
    let digest = format!("{:x}", Sha256::digest(normalized.as_bytes()));
    format!("res-{}", &digest[..32])
}

/// Split `content` into `(yaml, body)` when it opens with a front-matter block.
pub fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse one resource file. Returns `None` for files with nothing to index.
pub fn parse_resource(relative_path: &str, content: &str) -> Option<ResourceRecord> {
    let (front, body) = match split_front_matter(content) {
        Some((yaml, body)) => match parse_mapping(yaml) {
            Some(map) => (map, body.trim()),
            None => (Mapping::new(), content.trim()),
        },
        None => (Mapping::new(), content.trim()),
    };

    if front.is_empty() && body.is_empty() {
        return None;
    }

    let fm = FrontMatter::from_mapping(&front);
    let text = fm.searchable_text(body);

    let mut attributes = ResourceAttributes {
        title: fm.title.clone().unwrap_or_default(),
        author: fm.author.clone().unwrap_or_default(),
        year: fm.year.clone(),
        url: fm.url.clone(),
        relevance: fm.relevance.clone(),
        file_path: relative_path.replace('\\', "/"),
        ..Default::default()
    };
    for (field, values) in fm.sets() {
        for value in values {
            attributes.insert(field, value);
        }
    }

    Some(ResourceRecord {
        id: resource_id(relative_path),
        text,
        body: body.to_string(),
        embedding: None,
        attributes,
    })
}

/// `None` means the block is not a YAML mapping.
fn parse_mapping(yaml: &str) -> Option<Mapping> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Some(map),
        Ok(Value::Null) => Some(Mapping::new()),
        _ => None,
    }
}

/// Raw front-matter values in their original casing and order.
#[derive(Debug, Default)]
struct FrontMatter {
    title: Option<String>,
    author: Option<String>,
    url: Option<String>,
    year: Option<String>,
    relevance: Option<String>,
    institution: Vec<String>,
    tags: Vec<String>,
    target_audience: Vec<String>,
    resource_type: Vec<String>,
    key_concepts: Vec<String>,
}

impl FrontMatter {
    fn from_mapping(map: &Mapping) -> Self {
        let get = |key: &str| map.get(key);
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        Self {
            title: get("title").and_then(scalar),
            author: get("author").and_then(scalar),
            url: get("url").and_then(scalar),
            year: get("year").and_then(scalar),
            relevance: first(&RELEVANCE_KEYS).and_then(scalar),
            institution: get("institution").map(list).unwrap_or_default(),
            tags: get("tags").map(list).unwrap_or_default(),
            target_audience: get("target_audience").map(list).unwrap_or_default(),
            resource_type: get("type").map(list).unwrap_or_default(),
            key_concepts: first(&KEY_CONCEPT_KEYS).map(list).unwrap_or_default(),
        }
    }

    fn sets(&self) -> [(AttributeField, &[String]); 5] {
        [
            (AttributeField::Institution, &self.institution),
            (AttributeField::Tags, &self.tags),
            (AttributeField::TargetAudience, &self.target_audience),
            (AttributeField::Type, &self.resource_type),
            (AttributeField::KeyConcepts, &self.key_concepts),
        ]
    }

    fn searchable_text(&self, body: &str) -> String {
        let mut lines = Vec::new();
        if let Some(title) = &self.title {
            lines.push(format!("Title: {}", title));
        }
        if let Some(author) = &self.author {
            lines.push(format!("Author: {}", author));
        }
        if let Some(relevance) = &self.relevance {
            lines.push(format!("Relevance: {}", relevance));
        }
        let labelled = [
            ("Tags", &self.tags),
            ("Target Audience", &self.target_audience),
            ("Type", &self.resource_type),
            ("Key Concepts", &self.key_concepts),
        ];
        for (label, values) in labelled {
            if !values.is_empty() {
                lines.push(format!("{}: {}", label, values.join(", ")));
            }
        }
        if !body.is_empty() {
            lines.push(format!("Content: {}", body));
        }
        lines.join("\n")
    }
}

fn scalar(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A list value, or a comma-separated scalar.
fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other)
            .map(|s| {
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    }
}
