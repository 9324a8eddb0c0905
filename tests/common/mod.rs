//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use syllabus_core::embedding::EmbeddingProvider;
use tempfile::TempDir;

pub const DIMS: usize = 32;

/// Bag-of-words vector: each lowercase word is hashed into one of
/// `DIMS - 1` buckets; the last component is a constant bias.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        v[hash as usize % (DIMS - 1)] += 1.0;
    }
    v[DIMS - 1] = 0.5;
    v
}

pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// Answers Ollama `/api/embed` requests with [`keyword_vector`]s.
pub struct OllamaEmbedResponder;

impl wiremock::Respond for OllamaEmbedResponder {
    fn respond(&self, request: &wiremock::Request) -> wiremock::ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return wiremock::ResponseTemplate::new(400),
        };
        let inputs: Vec<String> = match &body["input"] {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
            serde_json::Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        };
        let embeddings: Vec<Vec<f32>> = inputs.iter().map(|t| keyword_vector(t)).collect();
        wiremock::ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ "embeddings": embeddings }))
    }
}

pub async fn mount_ollama(server: &wiremock::MockServer) {
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/api/embed"))
        .respond_with(OllamaEmbedResponder)
        .mount(server)
        .await;
}

pub fn write_file(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Three resources: two tagged `ethics` (one also about bias), one on ML.
pub fn write_sample_resources(dir: &Path) {
    write_file(
        dir,
        "bias-lab.md",
        "---\n\
         title: Bias Detection Lab\n\
         author: Dana Rivers\n\
         url: https://example.org/bias-lab\n\
         institution: Ethika\n\
         tags: [ethics, bias]\n\
         target_audience: [undergraduate]\n\
         type: activity\n\
         relevance_to_ethika: Hands-on bias auditing\n\
         ---\n\
         Students audit a hiring model for bias and discuss fairness metrics.\n",
    );
    write_file(
        dir,
        "privacy-case.md",
        "---\n\
         title: Privacy Case Studies\n\
         author: Lee Park\n\
         tags: [ethics, privacy]\n\
         target_audience: [undergraduate, graduate]\n\
         type: reading\n\
         ---\n\
         Case studies on data privacy, consent, and surveillance.\n",
    );
    write_file(
        dir,
        "ml-basics.md",
        "---\n\
         title: Machine Learning Basics\n\
         author: Sam Ortiz\n\
         tags: [machine_learning]\n\
         target_audience: [high_school]\n\
         type: lecture\n\
         ---\n\
         Gradient descent, overfitting, and model evaluation.\n",
    );
}

pub fn syllabus_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("syllabus");
    path
}

/// Temp workspace with a config file pointing at `embed_url` (Ollama API).
pub fn setup_test_env(embed_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let resources = root.join("resources");
    fs::create_dir_all(&resources).unwrap();
    write_sample_resources(&resources);

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("syllabus.toml");
    let config = format!(
        r#"[db]
path = "{root}/data/syllabus.sqlite"

[ingest]
root = "{root}/resources"

[embedding]
provider = "ollama"
model = "keyword-test"
dims = {dims}
url = "{url}"
max_retries = 0

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display(),
        dims = DIMS,
        url = embed_url,
    );
    fs::write(&config_path, config).unwrap();

    (tmp, config_path)
}

/// Run the binary; returns (stdout, stderr, success).
pub fn run_syllabus(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = std::process::Command::new(syllabus_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run syllabus binary");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}
