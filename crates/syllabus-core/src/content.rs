//! Detailed workshop content: the structured plan, the deterministic
//! fallback, and the prompts sent to a generation service.
//!
//! Nothing here performs I/O. The app crate's augmenter sends the prompts
//! built here, feeds the reply to [`parse_workshop_plan`], and falls back
//! to [`fallback_content`] whenever that fails.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Curriculum, ResourceRecord, SearchResult};

pub const DEFAULT_PREVIEW_CHARS: usize = 200;
pub const PROMPT_PREVIEW_CHARS: usize = 500;

pub const CURRICULUM_SYSTEM_PROMPT: &str =
    "You are an expert AI education curriculum designer. Always respond with valid JSON.";

const BASE_MATERIALS: [&str; 2] = ["Computer/Tablet", "Internet access"];

/// Where a piece of detailed content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub duration_minutes: f64,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub formative: Vec<String>,
    #[serde(default)]
    pub summative: String,
}

/// Structured workshop plan, in the JSON shape the generation service is asked for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkshopPlan {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub schedule: Vec<SessionPlan>,
    #[serde(default)]
    pub activities: Vec<ActivityPlan>,
    #[serde(default)]
    pub assessment: Assessment,
    #[serde(default)]
    pub materials_needed: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedContent {
    pub origin: ContentOrigin,
    #[serde(flatten)]
    pub plan: WorkshopPlan,
}

/// Accepts `30`, `30.5`, `"30"`, or `"30 minutes"`. Anything else is 0.
fn lenient_minutes<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    })
}

/// `125.0` → `"02:05"`.
pub fn clock(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as i64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Build workshop content from metadata alone. Pure: equal inputs give equal output.
pub fn fallback_content(curriculum: &Curriculum, objectives: &[String]) -> DetailedContent {
    let learning_objectives = if objectives.is_empty() {
        curriculum
            .topics
            .iter()
            .map(|t| format!("Understand key concepts in {}", t))
            .collect()
    } else {
        objectives.to_vec()
    };

    let schedule = curriculum
        .schedule
        .iter()
        .zip(&curriculum.resources)
        .map(|(slot, r)| SessionPlan {
            time: format!(
                "{}-{}",
                clock(slot.start_minutes),
                clock(slot.start_minutes + slot.duration_minutes)
            ),
            activity: slot.resource_title.clone(),
            description: r.attributes.relevance.clone().unwrap_or_default(),
            resource: r.attributes.url.clone(),
        })
        .collect();

    let activities = curriculum
        .resources
        .iter()
        .zip(&curriculum.schedule)
        .map(|(r, slot)| ActivityPlan {
            title: r.attributes.display_title().to_string(),
            description: r
                .attributes
                .relevance
                .clone()
                .unwrap_or_else(|| "Educational activity".to_string()),
            duration_minutes: slot.duration_minutes,
            materials: BASE_MATERIALS.iter().map(|m| m.to_string()).collect(),
            instructions: match &r.attributes.url {
                Some(url) => format!("Follow the activity guide: {}", url),
                None => format!(
                    "Follow the activity guide: See resource file {}",
                    r.attributes.file_path
                ),
            },
        })
        .collect();

    let mut materials_needed: Vec<String> = BASE_MATERIALS.iter().map(|m| m.to_string()).collect();
    materials_needed.push("Projector".to_string());

    DetailedContent {
        origin: ContentOrigin::Fallback,
        plan: WorkshopPlan {
            overview: format!(
                "Workshop on {} for {} students.",
                curriculum.topics.join(", "),
                curriculum.target_audience.join(", ")
            ),
            learning_objectives,
            schedule,
            activities,
            assessment: Assessment {
                formative: vec![
                    "Observation during activities".to_string(),
                    "Q&A sessions".to_string(),
                ],
                summative: "Reflection exercise at the end".to_string(),
            },
            materials_needed,
            notes: "Customize activities based on student needs and available time.".to_string(),
        },
    }
}

/// Numbered digest of resources for a generation prompt.
pub fn resource_digest(resources: &[ResourceRecord], preview_chars: usize) -> String {
    let mut out = String::new();
    for (i, r) in resources.iter().enumerate() {
        let a = &r.attributes;
        out.push_str(&format!("\n{}. {}\n", i + 1, a.display_title()));
        out.push_str(&format!("   Author: {}\n", a.display_author()));
        if let Some(url) = &a.url {
            out.push_str(&format!("   URL: {}\n", url));
        }
        if !a.tags.is_empty() {
            let tags: Vec<&str> = a.tags.iter().map(String::as_str).collect();
            out.push_str(&format!("   Tags: {}\n", tags.join(", ")));
        }
        if let Some(relevance) = &a.relevance {
            out.push_str(&format!("   Relevance: {}\n", relevance));
        }
        let source = if r.body.is_empty() { &r.text } else { &r.body };
        if !source.is_empty() {
            out.push_str(&format!("   Preview: {}\n", preview(source, preview_chars)));
        }
    }
    out
}

/// The user prompt asking for a structured [`WorkshopPlan`].
pub fn curriculum_prompt(
    curriculum: &Curriculum,
    objectives: &[String],
    institution_context: Option<&str>,
    preview_chars: usize,
) -> String {
    let mut prompt = format!(
        "Create a detailed workshop curriculum based on the following resources \
         and requirements.\n\n\
         INSTITUTION: {}\n\
         TARGET AUDIENCE: {}\n\
         TOPICS: {}\n\
         DURATION: {} hours\n\n\
         AVAILABLE RESOURCES:\n{}",
        curriculum.institution,
        curriculum.target_audience.join(", "),
        curriculum.topics.join(", "),
        curriculum.duration_hours,
        resource_digest(&curriculum.resources, preview_chars),
    );

    if !objectives.is_empty() {
        prompt.push_str("\nLEARNING OBJECTIVES:\n");
        for o in objectives {
            prompt.push_str(&format!("- {}\n", o));
        }
    }
    if let Some(context) = institution_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nINSTITUTION CONTEXT:\n{}\n", context.trim()));
    }

    prompt.push_str(
        r#"
Include a workshop overview, 3-5 learning objectives, a detailed schedule with
time allocations, a description for each activity, assessment ideas, the
materials needed, and additional notes.

Respond with JSON in exactly this structure:
{
  "overview": "...",
  "learning_objectives": ["..."],
  "schedule": [
    {"time": "00:00-00:30", "activity": "...", "description": "...", "resource": "..."}
  ],
  "activities": [
    {"title": "...", "description": "...", "duration_minutes": 30,
     "materials": ["..."], "instructions": "..."}
  ],
  "assessment": {"formative": ["..."], "summative": "..."},
  "materials_needed": ["..."],
  "notes": "..."
}
"#,
    );
    prompt
}

/// Remove a surrounding markdown code fence (with or without a language tag).
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let rest = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a generation reply into a plan. `None` when it is not a JSON object.
pub fn parse_workshop_plan(reply: &str) -> Option<WorkshopPlan> {
    let body = strip_code_fence(reply);
    if let Ok(plan) = serde_json::from_str::<WorkshopPlan>(body) {
        return Some(plan);
    }
    // Some models wrap the object in prose.
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// A retrieved resource as shown to the caller of the prompt boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitedResource {
    pub number: usize,
    pub title: String,
    pub author: String,
    pub url: Option<String>,
    pub distance: f32,
    pub citation: String,
    pub preview: String,
}

pub fn cite_resources(results: &[SearchResult]) -> Vec<CitedResource> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let a = &r.record.attributes;
            let number = i + 1;
            CitedResource {
                number,
                title: non_blank_or(&a.title, "Untitled Resource"),
                author: non_blank_or(&a.author, "Unknown Author"),
                url: a.url.clone(),
                distance: r.distance,
                citation: format!("[Source {}]", number),
                preview: preview(&r.record.text, PROMPT_PREVIEW_CHARS),
            }
        })
        .collect()
}

fn non_blank_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.trim().to_string()
    }
}

/// The user prompt asking for a complete markdown workshop that cites its sources.
pub fn markdown_prompt(request: &str, results: &[SearchResult], cited: &[CitedResource]) -> String {
    let records: Vec<ResourceRecord> = results.iter().map(|r| r.record.clone()).collect();
    let references: Vec<String> = cited
        .iter()
        .map(|c| match &c.url {
            Some(url) => format!("{}: {} by {} ({})", c.citation, c.title, c.author, url),
            None => format!("{}: {} by {}", c.citation, c.title, c.author),
        })
        .collect();

    format!(
        "You are an expert AI education content creator. Create a complete, ready-to-use \
         educational workshop or curriculum for the request below.\n\n\
         USER REQUEST:\n{}\n\n\
         RELEVANT RESOURCES FROM DATABASE:\n{}\n\n\
         The workshop must include a title and overview, the target audience, the duration, \
         3-5 measurable learning objectives, a schedule covering the entire duration, \
         detailed activity instructions, materials, assessment methods, a wrap-up, and a \
         Sources section.\n\n\
         Cite resources inline as [Source 1], [Source 2], and so on.\n\n\
         RESOURCE REFERENCE NUMBERS:\n{}\n\n\
         Respond in markdown only.",
        request,
        resource_digest(&records, PROMPT_PREVIEW_CHARS),
        references.join("\n"),
    )
}

/// Markdown summary of the retrieved resources, used when generation is unavailable.
pub fn fallback_markdown(request: &str, results: &[SearchResult]) -> String {
    let mut out = format!(
        "# Educational Content: {}\n\n\
         ## Overview\n\
         The following resources from the database address this request.\n\n\
         ## Your Request\n{}\n\n\
         ## Curated Resources\n",
        request, request
    );

    for (i, r) in results.iter().enumerate() {
        let a = &r.record.attributes;
        out.push_str(&format!("\n### [Source {}] {}\n\n", i + 1, a.display_title()));
        out.push_str(&format!("**Author:** {}\n\n", a.display_author()));
        if let Some(url) = &a.url {
            out.push_str(&format!("**URL:** {}\n\n", url));
        }
        if !a.tags.is_empty() {
            let tags: Vec<&str> = a.tags.iter().map(String::as_str).collect();
            out.push_str(&format!("**Tags:** {}\n\n", tags.join(", ")));
        }
        if let Some(relevance) = &a.relevance {
            out.push_str(&format!("**Relevance:** {}\n\n", relevance));
        }
    }

    out.push_str("\n## Sources\n\n");
    for (i, r) in results.iter().enumerate() {
        let a = &r.record.attributes;
        match &a.url {
            Some(url) => out.push_str(&format!(
                "- [Source {}] {} by {} ({})\n",
                i + 1,
                a.display_title(),
                a.display_author(),
                url
            )),
            None => out.push_str(&format!(
                "- [Source {}] {} by {}\n",
                i + 1,
                a.display_title(),
                a.display_author()
            )),
        }
    }
    out
}
