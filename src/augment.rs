//! Content augmentation with a text generator and a deterministic fallback.
//!
//! [`ContentAugmenter`] never fails. When no generator is configured, or
//! every attempt fails, or the reply cannot be parsed, the caller gets the
//! pure fallback built from resource metadata.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use syllabus_core::content::{
    cite_resources, curriculum_prompt, fallback_content, fallback_markdown, markdown_prompt,
    parse_workshop_plan, strip_code_fence, ContentOrigin, DetailedContent,
    CURRICULUM_SYSTEM_PROMPT,
};
use syllabus_core::models::{Curriculum, SearchResult};

use crate::config::GenerationConfig;
use crate::generation::{create_generator, GenerationError, TextGenerator};

const MARKDOWN_SYSTEM_PROMPT: &str =
    "You are an expert AI education content creator. Respond in markdown.";

/// Attempts and delays for generation calls.
///
/// The first retry waits `initial_backoff` and each later one doubles it.
/// A delay suggested by the service, plus `padding`, replaces the current
/// value before doubling continues from there. No single wait exceeds
/// `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub padding: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        let secs = |s: f64| Duration::try_from_secs_f64(s).unwrap_or_default();
        let max_backoff = secs(config.max_backoff_secs);
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: secs(config.initial_backoff_secs).min(max_backoff),
            padding: secs(config.retry_padding_secs),
            max_backoff,
        }
    }

    /// The wait before the next attempt, given the current delay and any
    /// delay the service asked for.
    fn next_wait(&self, current: Duration, suggested: Option<Duration>) -> Duration {
        suggested
            .map(|d| d.saturating_add(self.padding))
            .unwrap_or(current)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Call `generator`, retrying retryable failures per `policy`.
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    policy: &RetryPolicy,
    system: &str,
    user: &str,
    json: bool,
) -> Result<String, GenerationError> {
    let mut delay = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        match generator.generate(system, user, json).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let wait = policy.next_wait(delay, e.retry_after());
                warn!(
                    model = generator.model_name(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    ?wait,
                    error = %e,
                    "generation failed, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = wait.saturating_mul(2).min(policy.max_backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Markdown content for a free-form request, plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownOutcome {
    pub content: String,
    pub llm_used: bool,
    pub quota_error: bool,
    pub note: Option<String>,
}

pub struct ContentAugmenter {
    generator: Option<Arc<dyn TextGenerator>>,
    policy: RetryPolicy,
    preview_chars: usize,
}

impl ContentAugmenter {
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        policy: RetryPolicy,
        preview_chars: usize,
    ) -> Self {
        Self {
            generator,
            policy,
            preview_chars,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            create_generator(config),
            RetryPolicy::from_config(config),
            config.preview_chars,
        )
    }

    /// An augmenter that only ever produces fallback content.
    pub fn disabled() -> Self {
        Self::new(
            None,
            RetryPolicy::default(),
            syllabus_core::content::DEFAULT_PREVIEW_CHARS,
        )
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Detailed workshop content for `curriculum`.
    pub async fn augment(
        &self,
        curriculum: &Curriculum,
        objectives: &[String],
        institution_context: Option<&str>,
    ) -> DetailedContent {
        let Some(generator) = &self.generator else {
            debug!("no generator configured, using fallback content");
            return fallback_content(curriculum, objectives);
        };

        let prompt = curriculum_prompt(
            curriculum,
            objectives,
            institution_context,
            self.preview_chars,
        );
        match generate_with_retry(
            generator.as_ref(),
            &self.policy,
            CURRICULUM_SYSTEM_PROMPT,
            &prompt,
            true,
        )
        .await
        {
            Ok(reply) => match parse_workshop_plan(&reply) {
                Some(plan) => {
                    info!(model = generator.model_name(), "generated workshop content");
                    DetailedContent {
                        origin: ContentOrigin::Generated,
                        plan,
                    }
                }
                None => {
                    warn!(
                        model = generator.model_name(),
                        "unparseable generation reply, using fallback"
                    );
                    fallback_content(curriculum, objectives)
                }
            },
            Err(e) => {
                warn!(
                    model = generator.model_name(),
                    error = %e,
                    "generation failed, using fallback"
                );
                fallback_content(curriculum, objectives)
            }
        }
    }

    /// Markdown workshop for a free-form request, citing `results` as
    /// `[Source n]`. `use_llm = false` skips the generator entirely.
    pub async fn compose_markdown(
        &self,
        request: &str,
        results: &[SearchResult],
        use_llm: bool,
    ) -> MarkdownOutcome {
        let fallback = |quota_error: bool, note: &str| MarkdownOutcome {
            content: fallback_markdown(request, results),
            llm_used: false,
            quota_error,
            note: Some(note.to_string()),
        };

        if !use_llm {
            return fallback(
                false,
                "Content generated from database resources only (LLM disabled)",
            );
        }
        let Some(generator) = &self.generator else {
            return fallback(
                false,
                "Content generated from database resources only (no LLM configured)",
            );
        };

        let cited = cite_resources(results);
        let prompt = markdown_prompt(request, results, &cited);
        match generate_with_retry(
            generator.as_ref(),
            &self.policy,
            MARKDOWN_SYSTEM_PROMPT,
            &prompt,
            false,
        )
        .await
        {
            Ok(reply) if !reply.trim().is_empty() => MarkdownOutcome {
                content: strip_code_fence(&reply).to_string(),
                llm_used: true,
                quota_error: false,
                note: None,
            },
            Ok(_) => fallback(
                false,
                "LLM returned no content. Content generated from database resources only.",
            ),
            Err(e) if e.is_quota() => {
                warn!(error = %e, "generation quota exhausted, using fallback");
                fallback(
                    true,
                    "LLM quota exceeded. Content generated from database resources only. \
                     Please wait a few minutes and try again for LLM-generated content.",
                )
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using fallback");
                fallback(
                    false,
                    "LLM generation failed. Content generated from database resources only.",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use syllabus_core::models::{ResourceAttributes, ResourceRecord};

    /// Replays a fixed script of replies.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<String, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        fn new(mut replies: Vec<Result<String, GenerationError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn generate(&self, _: &str, _: &str, _: bool) -> Result<String, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(GenerationError::Timeout))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            padding: Duration::from_millis(1),
            max_backoff: Duration::from_millis(20),
        }
    }

    fn quota() -> GenerationError {
        GenerationError::RateLimited {
            retry_after: Some(Duration::from_millis(2)),
            message: "quota".into(),
        }
    }

    fn curriculum() -> Curriculum {
        let mut attributes = ResourceAttributes::default();
        attributes.title = "Bias in AI".into();
        Curriculum {
            institution: "Ethika".into(),
            target_audience: vec!["undergraduate".into()],
            topics: vec!["bias".into()],
            duration_hours: 1.0,
            resources: vec![ResourceRecord {
                id: "res-1".into(),
                text: "Title: Bias in AI".into(),
                body: String::new(),
                embedding: None,
                attributes,
            }],
            schedule: Vec::new(),
            detailed_content: None,
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let generator = ScriptedGenerator::new(vec![Err(quota()), Ok("done".into())]);
        let reply = generate_with_retry(&generator, &fast_policy(), "s", "u", false)
            .await
            .unwrap();
        assert_eq!(reply, "done");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::Service {
            status: 401,
            message: "bad key".into(),
        })]);
        let err = generate_with_retry(&generator, &fast_policy(), "s", "u", false)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Service { status: 401, .. }));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let generator = ScriptedGenerator::new(vec![
            Err(quota()),
            Err(quota()),
            Err(quota()),
            Ok("late".into()),
        ]);
        assert!(generate_with_retry(&generator, &fast_policy(), "s", "u", true)
            .await
            .is_err());
        assert_eq!(generator.calls(), 3);
    }

    #[test]
    fn test_waits_are_capped() {
        let policy = fast_policy();
        let current = Duration::from_millis(4);
        assert_eq!(policy.next_wait(current, None), current);
        assert_eq!(
            policy.next_wait(current, Some(Duration::from_millis(5))),
            Duration::from_millis(6)
        );
        assert_eq!(
            policy.next_wait(current, Some(Duration::from_secs(3600))),
            policy.max_backoff
        );
        assert_eq!(
            policy.next_wait(Duration::MAX, Some(Duration::MAX)),
            policy.max_backoff
        );
    }

    #[test]
    fn test_policy_from_config_clamps_initial_backoff() {
        let config = GenerationConfig {
            initial_backoff_secs: 120.0,
            max_backoff_secs: 10.0,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.initial_backoff, Duration::from_secs(10));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_long_suggested_delay_does_not_stall() {
        let hour = || GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
            message: "quota".into(),
        };
        let generator = ScriptedGenerator::new(vec![Err(hour()), Err(hour()), Err(hour())]);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            generate_with_retry(&generator, &fast_policy(), "s", "u", false),
        )
        .await
        .expect("retries must respect max_backoff");
        assert!(result.unwrap_err().is_quota());
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_augment_parses_fenced_reply() {
        let reply = "```json\n{\"overview\": \"Generated overview\", \"notes\": \"n\"}\n```";
        let augmenter = ContentAugmenter::new(
            Some(Arc::new(ScriptedGenerator::new(vec![Ok(reply.into())]))),
            fast_policy(),
            200,
        );
        let content = augmenter.augment(&curriculum(), &[], None).await;
        assert_eq!(content.origin, ContentOrigin::Generated);
        assert_eq!(content.plan.overview, "Generated overview");
    }

    #[tokio::test]
    async fn test_augment_falls_back_on_garbage_and_failure() {
        let c = curriculum();
        let expected = fallback_content(&c, &[]);

        let garbage = ContentAugmenter::new(
            Some(Arc::new(ScriptedGenerator::new(vec![Ok("not json at all".into())]))),
            fast_policy(),
            200,
        );
        assert_eq!(garbage.augment(&c, &[], None).await, expected);

        let failing = ContentAugmenter::new(
            Some(Arc::new(ScriptedGenerator::new(vec![]))),
            fast_policy(),
            200,
        );
        assert_eq!(failing.augment(&c, &[], None).await, expected);
        assert_eq!(ContentAugmenter::disabled().augment(&c, &[], None).await, expected);
    }

    #[tokio::test]
    async fn test_compose_markdown_quota_fallback() {
        let augmenter = ContentAugmenter::new(
            Some(Arc::new(ScriptedGenerator::new(vec![
                Err(quota()),
                Err(quota()),
                Err(quota()),
            ]))),
            fast_policy(),
            200,
        );
        let outcome = augmenter.compose_markdown("teach bias", &[], true).await;
        assert!(!outcome.llm_used);
        assert!(outcome.quota_error);
        assert!(outcome.content.starts_with("# Educational Content: teach bias"));
    }

    #[tokio::test]
    async fn test_compose_markdown_without_llm() {
        let outcome = ContentAugmenter::disabled()
            .compose_markdown("teach bias", &[], false)
            .await;
        assert!(!outcome.llm_used);
        assert!(!outcome.quota_error);
        assert!(outcome.note.unwrap().contains("LLM disabled"));
    }
}
