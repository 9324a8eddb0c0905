//! Topic extraction for free-text prompts.
//!
//! A prompt like `Build a workshop about "algorithmic bias" for teachers`
//! is expanded into extra search topics so retrieval covers more than the
//! literal sentence. The [`TopicExtractor`] trait keeps the strategy
//! pluggable; [`HeuristicTopicExtractor`] is the default:
//!
//! 1. quoted phrases
//! 2. objects of `on/about/regarding/concerning` and `for/with/including`
//!    (longer than 3 characters)
//! 3. the first 8 words longer than 4 characters that are not stop words
//!
//! Topics are deduplicated case-insensitively in that order and capped at 10.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_TOPICS: usize = 10;
const MAX_KEYWORDS: usize = 8;

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:on|about|regarding|concerning)\s+([^,.!?]+)").expect("valid regex")
});
static AUDIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:for|with|including)\s+([^,.!?]+)").expect("valid regex")
});

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "should", "could", "may", "might", "must", "can", "about",
    "create", "generate", "please", "using", "which", "their", "there", "these", "those", "where",
    "while", "other",
];

pub trait TopicExtractor: Send + Sync {
    fn extract(&self, prompt: &str) -> Vec<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTopicExtractor;

impl TopicExtractor for HeuristicTopicExtractor {
    fn extract(&self, prompt: &str) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();

        topics.extend(
            QUOTED_RE
                .captures_iter(prompt)
                .map(|c| c[1].trim().to_string()),
        );

        for re in [&*SUBJECT_RE, &*AUDIENCE_RE] {
            topics.extend(
                re.captures_iter(prompt)
                    .map(|c| {
                        c[1].trim_matches(|ch: char| ch == '"' || ch.is_whitespace())
                            .to_string()
                    })
                    .filter(|t| t.chars().count() > 3),
            );
        }

        topics.extend(
            prompt
                .split_whitespace()
                .filter(|w| w.chars().count() > 4)
                .map(|w| {
                    w.trim_matches(|ch: char| !ch.is_alphanumeric())
                        .to_lowercase()
                })
                .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
                .take(MAX_KEYWORDS),
        );

        let mut seen = HashSet::new();
        topics
            .into_iter()
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .take(MAX_TOPICS)
            .collect()
    }
}
