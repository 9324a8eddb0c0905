//! Storage abstraction for the embedding index.
//!
//! The [`ResourceIndex`] trait is everything retrieval and curriculum
//! assembly need from a backend. Backends must make each `upsert` and
//! `delete` call atomic: concurrent readers see a batch entirely or not
//! at all.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](ResourceIndex::upsert) | Insert or overwrite embedded records by id |
//! | [`query`](ResourceIndex::query) | k nearest records satisfying a predicate |
//! | [`list_all`](ResourceIndex::list_all) | Records in insertion order |
//! | [`delete`](ResourceIndex::delete) | Remove records by id (idempotent) |
//! | [`count`](ResourceIndex::count) | Number of stored records |

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{check_batch, EmbeddingProvider};
use crate::models::{ResourceRecord, SearchResult};
use crate::predicate::Predicate;

#[async_trait]
pub trait ResourceIndex: Send + Sync {
    /// Insert or overwrite records by id. Every record must carry an embedding.
    ///
    /// An overwritten record keeps its original insertion position.
    async fn upsert(&self, records: &[ResourceRecord]) -> Result<()>;

    /// Return up to `k` records matching `predicate`, ascending by cosine
    /// distance. Ties keep insertion order.
    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        predicate: &Predicate,
    ) -> Result<Vec<SearchResult>>;

    /// Return records in insertion order, up to `limit` when given.
    async fn list_all(&self, limit: Option<usize>) -> Result<Vec<ResourceRecord>>;

    /// Delete records by id. Unknown ids are ignored. Returns the number removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

/// Embed the records that lack a vector, then upsert the whole batch at once.
///
/// Embedding happens before any write, so a provider failure leaves the
/// index untouched.
pub async fn upsert_records(
    index: &dyn ResourceIndex,
    provider: &dyn EmbeddingProvider,
    mut records: Vec<ResourceRecord>,
) -> Result<usize> {
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.embedding.is_none())
        .map(|(i, _)| i)
        .collect();

    if !missing.is_empty() {
        let texts: Vec<String> = missing.iter().map(|&i| records[i].text.clone()).collect();
        let vectors = provider.embed(&texts).await?;
        check_batch(provider, texts.len(), &vectors)?;
        for (i, vector) in missing.into_iter().zip(vectors) {
            records[i].embedding = Some(vector);
        }
    }

    index.upsert(&records).await?;
    Ok(records.len())
}

/// Reject records without an embedding before touching the backend.
pub fn ensure_embedded(records: &[ResourceRecord]) -> Result<()> {
    if let Some(r) = records.iter().find(|r| r.embedding.is_none()) {
        bail!("record {} has no embedding", r.id);
    }
    Ok(())
}

/// Sort candidates by distance, keeping insertion order on ties, and keep `k`.
///
/// `candidates` must already be in insertion order.
pub fn rank_candidates(mut candidates: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(k);
    candidates
}
