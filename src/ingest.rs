//! Ingestion pipeline.
//!
//! Walks the resource root, turns each matching file into a
//! [`ResourceRecord`] via front-matter parsing, and upserts records in
//! embedding-sized batches. Files that cannot be read or parsed are
//! skipped with a warning; a batch that fails to embed is counted and the
//! run continues with the next one.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use syllabus_core::embedding::EmbeddingProvider;
use syllabus_core::frontmatter::parse_resource;
use syllabus_core::models::ResourceRecord;
use syllabus_core::store::{upsert_records, ResourceIndex};

use crate::config::IngestConfig;

/// Counters for one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub root: PathBuf,
    pub files_found: usize,
    pub skipped: usize,
    pub upserted: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl IngestReport {
    pub fn print(&self) {
        if self.dry_run {
            println!("ingest {} (dry-run)", self.root.display());
        } else {
            println!("ingest {}", self.root.display());
        }
        println!("  files found: {}", self.files_found);
        println!("  skipped: {}", self.skipped);
        if self.dry_run {
            println!("  would upsert: {}", self.upserted);
        } else {
            println!("  upserted: {}", self.upserted);
            println!("  failed: {}", self.failed);
        }
        println!("ok");
    }
}

/// Scan `root` and parse every matching file into a record, sorted by path.
///
/// Returns the records plus the number of files that were found but skipped.
pub fn scan_resources(config: &IngestConfig, root: &Path) -> Result<(Vec<ResourceRecord>, usize)> {
    if !root.exists() {
        bail!("Resource root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        paths.push((path.to_path_buf(), rel_str));
    }
    paths.sort_by(|a, b| a.1.cmp(&b.1));

    let mut records = Vec::with_capacity(paths.len());
    let mut skipped = 0;
    for (path, rel_str) in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };
        match parse_resource(&rel_str, &content) {
            Some(record) => records.push(record),
            None => {
                debug!(path = %rel_str, "skipping empty resource");
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

/// What an ingest of `root` would write, without embedding or storing anything.
pub fn preview_root(config: &IngestConfig, root: &Path) -> Result<IngestReport> {
    let (records, skipped) = scan_resources(config, root)?;
    Ok(IngestReport {
        root: root.to_path_buf(),
        files_found: records.len() + skipped,
        skipped,
        upserted: records.len(),
        failed: 0,
        dry_run: true,
    })
}

/// Scan `root` and upsert its resources into `index`.
///
/// Re-running over the same files overwrites records in place, so the
/// index never holds duplicates of one file.
pub async fn ingest_root(
    config: &IngestConfig,
    batch_size: usize,
    index: &dyn ResourceIndex,
    provider: &dyn EmbeddingProvider,
    root: &Path,
    dry_run: bool,
) -> Result<IngestReport> {
    if dry_run {
        return preview_root(config, root);
    }

    let (records, skipped) = scan_resources(config, root)?;
    let mut report = IngestReport {
        root: root.to_path_buf(),
        files_found: records.len() + skipped,
        skipped,
        ..Default::default()
    };

    let mut pending = records;
    while !pending.is_empty() {
        let rest = pending.split_off(batch_size.max(1).min(pending.len()));
        let batch = std::mem::replace(&mut pending, rest);
        let batch_len = batch.len();
        match upsert_records(index, provider, batch).await {
            Ok(n) => report.upserted += n,
            Err(e) => {
                warn!(error = %e, records = batch_len, "failed to ingest batch");
                report.failed += batch_len;
            }
        }
    }

    info!(
        root = %root.display(),
        upserted = report.upserted,
        failed = report.failed,
        skipped = report.skipped,
        "ingest finished"
    );
    Ok(report)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_core::store::memory::InMemoryIndex;
    use tempfile::TempDir;

    use crate::testing::KeywordEmbedder;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "ethics/bias.md",
            concat!(
                "---\ntitle: Bias in AI\ntags: [ethics, bias]\n",
                "target_audience: [undergraduate]\n---\nFairness matters.\n",
            ),
        );
        write(
            tmp.path(),
            "intro.md",
            "---\ntitle: Intro to ML\ntags: ml\n---\nGradient descent basics.\n",
        );
        write(tmp.path(), "empty.md", "");
        write(tmp.path(), "notes.txt", "not markdown");
        write(tmp.path(), ".git/objects/x.md", "---\ntitle: hidden\n---\n");
        tmp
    }

    #[test]
    fn test_scan_filters_and_skips() {
        let tmp = fixture();
        let (records, skipped) = scan_resources(&IngestConfig::default(), tmp.path()).unwrap();

        let titles: Vec<&str> = records.iter().map(|r| r.attributes.title.as_str()).collect();
        assert_eq!(titles, vec!["Bias in AI", "Intro to ML"]);
        assert_eq!(skipped, 1);
        assert_eq!(records[0].attributes.file_path, "ethics/bias.md");
    }

    #[test]
    fn test_scan_missing_root() {
        let err = scan_resources(&IngestConfig::default(), Path::new("/no/such/root")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let tmp = fixture();
        let index = InMemoryIndex::new();
        let embedder = KeywordEmbedder::default();

        let first = ingest_root(&IngestConfig::default(), 1, &index, &embedder, tmp.path(), false)
            .await
            .unwrap();
        assert_eq!(first.upserted, 2);
        assert_eq!(first.failed, 0);

        ingest_root(&IngestConfig::default(), 64, &index, &embedder, tmp.path(), false)
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = fixture();
        let index = InMemoryIndex::new();
        let embedder = KeywordEmbedder::default();

        let report = ingest_root(&IngestConfig::default(), 64, &index, &embedder, tmp.path(), true)
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.upserted, 2);
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
