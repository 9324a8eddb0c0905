//! End-to-end tests of the `syllabus` binary against a mocked Ollama
//! embedding endpoint.

mod common;

use std::path::{Path, PathBuf};

use common::{mount_ollama, run_syllabus, setup_test_env, write_file};
use wiremock::MockServer;

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(config: &Path, args: &[&str]) -> (String, String, bool) {
    let config = config.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_syllabus(&config, &args)
    })
    .await
    .unwrap()
}

async fn ingested() -> (MockServer, tempfile::TempDir, PathBuf) {
    let server = MockServer::start().await;
    mount_ollama(&server).await;
    let (tmp, config) = setup_test_env(&server.uri());

    let (stdout, stderr, ok) = run(&config, &["init"]).await;
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));

    let (stdout, stderr, ok) = run(&config, &["ingest"]).await;
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("files found: 3"));
    assert!(stdout.contains("upserted: 3"));
    assert!(stdout.trim_end().ends_with("ok"));

    (server, tmp, config)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reingest_is_idempotent() {
    let (_server, _tmp, config) = ingested().await;

    let (_, stderr, ok) = run(&config, &["ingest"]).await;
    assert!(ok, "{}", stderr);

    let (stdout, _, ok) = run(&config, &["resources"]).await;
    assert!(ok);
    assert!(stdout.starts_with("3 resources"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_dry_run_needs_no_model() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");

    let (stdout, stderr, ok) = run(&config, &["ingest", "--dry-run"]).await;
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("would upsert: 3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_model_is_fatal() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");

    let (_, _, ok) = run(&config, &["search", "bias"]).await;
    assert!(!ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_with_tag_filter() {
    let (_server, _tmp, config) = ingested().await;

    let (stdout, stderr, ok) = run(&config, &["search", "bias", "--tag", "ethics"]).await;
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("Bias Detection Lab"));
    assert!(stdout.contains("Privacy Case Studies"));
    assert!(!stdout.contains("Machine Learning Basics"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_json_output() {
    let (_server, _tmp, config) = ingested().await;

    let (stdout, _, ok) = run(
        &config,
        &["search", "gradient descent", "--audience", "high_school", "--output", "json"],
    )
    .await;
    assert!(ok);
    let body: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(body["results_count"], 1);
    assert_eq!(
        body["results"][0]["attributes"]["title"],
        "Machine Learning Basics"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_curriculum_text_and_save() {
    let (_server, tmp, config) = ingested().await;
    let saved = tmp.path().join("plan.txt");

    let (stdout, stderr, ok) = run(
        &config,
        &[
            "curriculum",
            "--institution",
            "Ethika",
            "--audience",
            "undergraduate",
            "--topics",
            "bias,privacy",
            "--duration",
            "1",
            "--save",
            saved.to_str().unwrap(),
        ],
    )
    .await;
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("Total Resources: 2"));
    assert!(stdout.contains("SUGGESTED SCHEDULE"));
    assert!(stdout.contains("00:00 (30 min)"));
    assert!(stdout.contains("00:30 (30 min)"));
    assert!(stdout.contains("Curriculum saved to:"));

    let written = std::fs::read_to_string(&saved).unwrap();
    assert!(written.contains("CUSTOMIZED CURRICULUM"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_curriculum_advanced_has_workshop_plan() {
    let (_server, _tmp, config) = ingested().await;

    let (stdout, stderr, ok) = run(
        &config,
        &[
            "curriculum",
            "--institution",
            "Ethika",
            "--audience",
            "undergraduate",
            "--topics",
            "bias",
            "--advanced",
        ],
    )
    .await;
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("WORKSHOP PLAN"));
    assert!(stdout.contains("Understand key concepts in bias"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_curriculum_rejects_non_positive_duration() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");

    let (_, stderr, ok) = run(
        &config,
        &[
            "curriculum",
            "--institution",
            "Ethika",
            "--audience",
            "undergraduate",
            "--topics",
            "bias",
            "--duration",
            "0",
        ],
    )
    .await;
    assert!(!ok);
    assert!(stderr.contains("duration_hours"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prompt_without_llm() {
    let (_server, _tmp, config) = ingested().await;

    let (stdout, stderr, ok) = run(
        &config,
        &["prompt", "A workshop on bias and privacy", "--no-llm"],
    )
    .await;
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("# Educational Content: A workshop on bias and privacy"));
    assert!(stdout.contains("[Source 1]"));
    assert!(stderr.contains("LLM disabled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dedupe_removes_copies() {
    let (_server, tmp, config) = ingested().await;
    let original = std::fs::read_to_string(tmp.path().join("resources/bias-lab.md")).unwrap();
    write_file(&tmp.path().join("resources"), "copies/bias-lab-copy.md", &original);

    let (stdout, _, ok) = run(&config, &["ingest"]).await;
    assert!(ok);
    assert!(stdout.contains("upserted: 4"));

    let (stdout, _, ok) = run(&config, &["dedupe", "--dry-run"]).await;
    assert!(ok);
    assert!(stdout.contains("duplicates: 1"));

    let (stdout, _, ok) = run(&config, &["dedupe"]).await;
    assert!(ok);
    assert!(stdout.contains("removed: 1"));

    let (stdout, _, _) = run(&config, &["resources"]).await;
    assert!(stdout.starts_with("3 resources"));
}
