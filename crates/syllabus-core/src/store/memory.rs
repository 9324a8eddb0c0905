//! In-memory [`ResourceIndex`] for tests and embedding into other hosts.
//!
//! Records live in a `Vec` behind a `std::sync::RwLock`, so vector order is
//! insertion order. Queries are brute-force cosine distance over every
//! matching record.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{ResourceRecord, SearchResult};
use crate::predicate::Predicate;

use super::{ensure_embedded, rank_candidates, ResourceIndex};

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<ResourceRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ResourceRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ResourceRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))
    }
}

#[async_trait]
impl ResourceIndex for InMemoryIndex {
    async fn upsert(&self, records: &[ResourceRecord]) -> Result<()> {
        ensure_embedded(records)?;
        let mut stored = self.write()?;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        predicate: &Predicate,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let stored = self.read()?;
        let candidates = stored
            .iter()
            .filter(|r| predicate.matches(&r.attributes))
            .filter_map(|r| {
                let vector = r.embedding.as_deref()?;
                Some(SearchResult {
                    distance: cosine_distance(query_vec, vector),
                    record: r.clone(),
                })
            })
            .collect();
        Ok(rank_candidates(candidates, k))
    }

    async fn list_all(&self, limit: Option<usize>) -> Result<Vec<ResourceRecord>> {
        let stored = self.read()?;
        let take = limit.unwrap_or(stored.len());
        Ok(stored.iter().take(take).cloned().collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut stored = self.write()?;
        let before = stored.len();
        stored.retain(|r| !ids.contains(r.id.as_str()));
        Ok(before - stored.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeField, ResourceAttributes};

    fn record(id: &str, tags: &[&str], vector: Vec<f32>) -> ResourceRecord {
        let mut attributes = ResourceAttributes {
            title: id.to_uppercase(),
            ..Default::default()
        };
        for t in tags {
            attributes.insert(AttributeField::Tags, t);
        }
        ResourceRecord {
            id: id.to_string(),
            text: format!("Title: {}", id),
            body: String::new(),
            embedding: Some(vector),
            attributes,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_in_place() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record("a", &[], vec![1.0, 0.0]), record("b", &[], vec![0.0, 1.0])])
            .await
            .unwrap();
        let mut changed = record("a", &["new"], vec![1.0, 0.0]);
        changed.text = "changed".to_string();
        index.upsert(&[changed]).await.unwrap();

        let all = index.list_all(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");
        assert_eq!(all[0].text, "changed");
        assert_eq!(all[1].id, "b");
    }

    #[tokio::test]
    async fn test_upsert_rejects_unembedded_batch() {
        let index = InMemoryIndex::new();
        let mut bare = record("b", &[], vec![]);
        bare.embedding = None;
        let result = index.upsert(&[record("a", &[], vec![1.0]), bare]).await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_with_stable_ties() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("far", &[], vec![0.0, 1.0]),
                record("tie1", &[], vec![1.0, 1.0]),
                record("near", &[], vec![1.0, 0.0]),
                record("tie2", &[], vec![2.0, 2.0]),
            ])
            .await
            .unwrap();

        let results = index
            .query(&[1.0, 0.0], 10, &Predicate::Always)
            .await
            .unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "tie1", "tie2", "far"]);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_query_applies_predicate_and_k() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("a", &["ml"], vec![1.0, 0.0]),
                record("b", &["ethics"], vec![1.0, 0.1]),
                record("c", &["ethics"], vec![1.0, 0.2]),
            ])
            .await
            .unwrap();

        let ethics = Predicate::contains(AttributeField::Tags, "Ethics").unwrap();
        let results = index.query(&[1.0, 0.0], 1, &ethics).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "b");

        let none = Predicate::contains(AttributeField::Tags, "robotics").unwrap();
        assert!(index.query(&[1.0, 0.0], 5, &none).await.unwrap().is_empty());
        assert!(index.query(&[1.0, 0.0], 0, &Predicate::Always).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let index = InMemoryIndex::new();
        index.upsert(&[record("a", &[], vec![1.0])]).await.unwrap();
        let ids = vec!["a".to_string(), "missing".to_string()];
        assert_eq!(index.delete(&ids).await.unwrap(), 1);
        assert_eq!(index.delete(&ids).await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_all_limit() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record("a", &[], vec![1.0]), record("b", &[], vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.list_all(Some(1)).await.unwrap().len(), 1);
        assert_eq!(index.list_all(Some(10)).await.unwrap().len(), 2);
    }
}
