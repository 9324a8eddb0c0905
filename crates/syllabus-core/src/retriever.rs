//! Semantic retrieval over a [`ResourceIndex`].
//!
//! The retriever embeds the query with the index's provider, turns
//! [`SearchFilters`] into a [`Predicate`], and asks the index for the
//! nearest matches. Results come back ascending by distance, with index
//! insertion order breaking ties.

use std::collections::HashSet;
use std::hash::Hash;

use anyhow::Result;

use crate::embedding::{check_batch, embed_one, EmbeddingProvider};
use crate::models::{SearchFilters, SearchResult};
use crate::predicate::Predicate;
use crate::store::{rank_candidates, ResourceIndex};

pub struct Retriever<'a> {
    index: &'a dyn ResourceIndex,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn ResourceIndex, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { index, provider }
    }

    /// Search with a natural-language query.
    ///
    /// A non-positive `limit` or a blank query yields an empty list without
    /// calling the embedding provider.
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        if limit <= 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.provider, query).await?;
        self.search_by_vector(&query_vec, limit, filters).await
    }

    /// Search with an already-embedded query.
    pub async fn search_by_vector(
        &self,
        query_vec: &[f32],
        limit: i64,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let predicate = Predicate::from_filters(filters);
        let results = self
            .index
            .query(query_vec, limit as usize, &predicate)
            .await?;
        // Backends already rank; re-ranking is a no-op for a conforming index.
        Ok(rank_candidates(results, limit as usize))
    }

    /// Embed several queries in one provider call.
    pub async fn embed_queries(&self, queries: &[String]) -> Result<Vec<Vec<f32>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.provider.embed(queries).await?;
        check_batch(self.provider, queries.len(), &vectors)?;
        Ok(vectors)
    }
}

/// Keep the first item for each key, preserving order.
pub fn dedupe_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}
