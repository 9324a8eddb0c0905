//! Plain-text renderings of command results for the CLI.

use std::fmt::Write;

use syllabus_core::models::{Curriculum, ResourceRecord, SearchResult};

use crate::service::{DedupeReport, SearchResponse};

const RULE: &str = concat!(
    "========================================",
    "========================================"
);

fn joined(set: &std::collections::BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn section(out: &mut String, heading: &str) {
    let _ = writeln!(out, "\n{}\n{}\n{}\n", RULE, heading, RULE);
}

/// `HH:MM` of a start offset, truncated to whole minutes.
fn start_clock(minutes: f64) -> String {
    let total = minutes.max(0.0) as i64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn format_search(response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    for (i, result) in response.results.iter().enumerate() {
        write_search_result(&mut out, i + 1, result);
    }
    out
}

fn write_search_result(out: &mut String, rank: usize, result: &SearchResult) {
    let a = &result.record.attributes;
    let _ = writeln!(
        out,
        "{}. [{:.3}] {}",
        rank,
        result.distance,
        a.display_title()
    );
    let _ = writeln!(out, "    author: {}", a.display_author());
    if let Some(url) = &a.url {
        let _ = writeln!(out, "    url: {}", url);
    }
    if !a.tags.is_empty() {
        let _ = writeln!(out, "    tags: {}", joined(&a.tags));
    }
    if !a.target_audience.is_empty() {
        let _ = writeln!(out, "    audience: {}", joined(&a.target_audience));
    }
    let _ = writeln!(out, "    file: {}", a.file_path);
    let _ = writeln!(out, "    id: {}", result.record.id);
    out.push('\n');
}

pub fn format_resources(resources: &[ResourceRecord]) -> String {
    let mut out = format!("{} resources\n", resources.len());
    for (i, record) in resources.iter().enumerate() {
        let a = &record.attributes;
        let _ = writeln!(out, "{}. {} / {}", i + 1, a.display_title(), a.display_author());
        let _ = writeln!(out, "    file: {}", a.file_path);
    }
    out
}

pub fn format_curriculum(curriculum: &Curriculum) -> String {
    let mut out = String::new();
    section(&mut out, "CUSTOMIZED CURRICULUM");
    let _ = writeln!(out, "Institution: {}", curriculum.institution);
    let _ = writeln!(out, "Target Audience: {}", curriculum.target_audience.join(", "));
    let _ = writeln!(out, "Topics: {}", curriculum.topics.join(", "));
    let _ = writeln!(out, "Duration: {} hours", curriculum.duration_hours);
    let _ = writeln!(out, "Total Resources: {}", curriculum.resources.len());

    section(&mut out, "RESOURCES");
    for (i, record) in curriculum.resources.iter().enumerate() {
        let a = &record.attributes;
        let _ = writeln!(out, "{}. {}", i + 1, a.display_title());
        let _ = writeln!(out, "   Author: {}", a.display_author());
        if let Some(url) = &a.url {
            let _ = writeln!(out, "   URL: {}", url);
        }
        if !a.tags.is_empty() {
            let _ = writeln!(out, "   Tags: {}", joined(&a.tags));
        }
        out.push('\n');
    }

    section(&mut out, "SUGGESTED SCHEDULE");
    for item in &curriculum.schedule {
        let _ = writeln!(
            out,
            "{} ({} min) - {}",
            start_clock(item.start_minutes),
            item.duration_minutes as i64,
            item.resource_title
        );
    }

    if let Some(content) = &curriculum.detailed_content {
        let plan = &content.plan;
        section(&mut out, "WORKSHOP PLAN");
        let _ = writeln!(out, "{}\n", plan.overview);
        if !plan.learning_objectives.is_empty() {
            let _ = writeln!(out, "Learning Objectives:");
            for objective in &plan.learning_objectives {
                let _ = writeln!(out, "  - {}", objective);
            }
            out.push('\n');
        }
        for session in &plan.schedule {
            let _ = writeln!(out, "{}  {}", session.time, session.activity);
            if !session.description.is_empty() {
                let _ = writeln!(out, "       {}", session.description);
            }
        }
        if !plan.materials_needed.is_empty() {
            let _ = writeln!(out, "\nMaterials: {}", plan.materials_needed.join(", "));
        }
        if !plan.notes.is_empty() {
            let _ = writeln!(out, "\nNotes: {}", plan.notes);
        }
    }
    out
}

pub fn format_dedupe(report: &DedupeReport) -> String {
    let mut out = if report.dry_run {
        "dedupe (dry-run)\n".to_string()
    } else {
        "dedupe\n".to_string()
    };
    let _ = writeln!(out, "  scanned: {}", report.scanned);
    let _ = writeln!(out, "  duplicates: {}", report.duplicates.len());
    if !report.dry_run {
        let _ = writeln!(out, "  removed: {}", report.removed);
    }
    out.push_str("ok\n");
    out
}
