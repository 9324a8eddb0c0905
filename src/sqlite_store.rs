//! SQLite-backed [`ResourceIndex`].
//!
//! Records live in `resources`, set-valued attributes in
//! `resource_attributes` (one row per token), and every collection is
//! tagged in `collections` with the embedding model that built it.
//! Predicates compile to `EXISTS` sub-queries; cosine distance is computed
//! in Rust over the filtered rows.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use syllabus_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use syllabus_core::models::{AttributeField, ResourceAttributes, ResourceRecord, SearchResult};
use syllabus_core::predicate::Predicate;
use syllabus_core::store::{ensure_embedded, rank_candidates, ResourceIndex};

use crate::migrate::run_migrations;

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit.
const ID_CHUNK: usize = 500;

const RECORD_COLUMNS: &str =
    "r.id, r.text, r.body, r.title, r.author, r.year, r.url, r.relevance, r.file_path, r.embedding";

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    model: String,
    dims: usize,
    /// Serializes write transactions so a read-then-write never has to
    /// upgrade a stale WAL snapshot.
    write_lock: Mutex<()>,
}

impl SqliteIndex {
    /// Open a collection, creating it on first use.
    ///
    /// Fails when the collection was built with a different embedding
    /// model or dimensionality.
    pub async fn open(
        pool: SqlitePool,
        collection: &str,
        model: &str,
        dims: usize,
    ) -> Result<Self> {
        run_migrations(&pool).await?;

        let existing: Option<(String, i64)> =
            sqlx::query_as("SELECT model, dims FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&pool)
                .await?;

        match existing {
            Some((stored_model, stored_dims)) => {
                if stored_model != model || stored_dims != dims as i64 {
                    bail!(
                        "collection '{}' was built with embedding model '{}' ({} dims), \
                         but the configured model is '{}' ({} dims). \
                         Re-ingest with --reset or restore the original model.",
                        collection,
                        stored_model,
                        stored_dims,
                        model,
                        dims
                    );
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(collection)
                .bind(model)
                .bind(dims as i64)
                .bind(chrono::Utc::now().timestamp())
                .execute(&pool)
                .await?;
            }
        }

        Ok(Self {
            pool,
            collection: collection.to_string(),
            model: model.to_string(),
            dims,
            write_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fill the set-valued attributes of `records` from `resource_attributes`.
    async fn attach_attributes(&self, records: &mut [ResourceRecord]) -> Result<()> {
        let positions: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT resource_id, field, token FROM resource_attributes \
                 WHERE collection = ? AND resource_id IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql).bind(&self.collection);
            for id in chunk {
                query = query.bind(id);
            }
            for row in query.fetch_all(&self.pool).await? {
                let resource_id: String = row.get("resource_id");
                let field: String = row.get("field");
                let token: String = row.get("token");
                let Some(&i) = positions.get(&resource_id) else {
                    continue;
                };
                let Some(field) = AttributeField::parse(&field) else {
                    continue;
                };
                records[i].attributes.set_mut(field).insert(token);
            }
        }
        Ok(())
    }
}

/// Delete a collection and everything in it, including its model tag.
pub async fn drop_collection(pool: &SqlitePool, collection: &str) -> Result<u64> {
    run_migrations(pool).await?;
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM resource_attributes WHERE collection = ?")
        .bind(collection)
        .execute(&mut *tx)
        .await?;
    let removed = sqlx::query("DELETE FROM resources WHERE collection = ?")
        .bind(collection)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM collections WHERE name = ?")
        .bind(collection)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(removed)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_to_record(row: &SqliteRow) -> ResourceRecord {
    let blob: Vec<u8> = row.get("embedding");
    ResourceRecord {
        id: row.get("id"),
        text: row.get("text"),
        body: row.get("body"),
        embedding: Some(blob_to_vec(&blob)),
        attributes: ResourceAttributes {
            title: row.get("title"),
            author: row.get("author"),
            year: row.get("year"),
            url: row.get("url"),
            relevance: row.get("relevance"),
            file_path: row.get("file_path"),
            ..Default::default()
        },
    }
}

/// Compile a predicate to a SQL boolean over the `resources r` alias.
///
/// Bind values are appended to `binds` in placeholder order.
fn compile_predicate(predicate: &Predicate, binds: &mut Vec<String>) -> String {
    match predicate {
        Predicate::Always => "1".to_string(),
        Predicate::Contains { field, token } => {
            binds.push(field.as_str().to_string());
            binds.push(token.clone());
            "EXISTS (SELECT 1 FROM resource_attributes a \
             WHERE a.collection = r.collection AND a.resource_id = r.id \
             AND a.field = ? AND a.token = ?)"
                .to_string()
        }
        Predicate::AnyOf(children) if children.is_empty() => "0".to_string(),
        Predicate::AllOf(children) if children.is_empty() => "1".to_string(),
        Predicate::AnyOf(children) => {
            let parts: Vec<String> = children
                .iter()
                .map(|c| compile_predicate(c, binds))
                .collect();
            format!("({})", parts.join(" OR "))
        }
        Predicate::AllOf(children) => {
            let parts: Vec<String> = children
                .iter()
                .map(|c| compile_predicate(c, binds))
                .collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

#[async_trait]
impl ResourceIndex for SqliteIndex {
    async fn upsert(&self, records: &[ResourceRecord]) -> Result<()> {
        ensure_embedded(records)?;
        if let Some(r) = records
            .iter()
            .find(|r| r.embedding.as_ref().map(Vec::len) != Some(self.dims))
        {
            bail!(
                "record {} has an embedding of the wrong size for collection '{}' ({} dims)",
                r.id,
                self.collection,
                self.dims
            );
        }

        let now = chrono::Utc::now().timestamp();
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut next_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM resources WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_one(&mut *tx)
        .await?;

        for record in records {
            let blob = vec_to_blob(record.embedding.as_deref().unwrap_or_default());
            let a = &record.attributes;

            sqlx::query(
                r#"
                INSERT INTO resources (collection, id, seq, text, body, title, author,
                                       year, url, relevance, file_path, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    body = excluded.body,
                    title = excluded.title,
                    author = excluded.author,
                    year = excluded.year,
                    url = excluded.url,
                    relevance = excluded.relevance,
                    file_path = excluded.file_path,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(next_seq)
            .bind(&record.text)
            .bind(&record.body)
            .bind(&a.title)
            .bind(&a.author)
            .bind(&a.year)
            .bind(&a.url)
            .bind(&a.relevance)
            .bind(&a.file_path)
            .bind(&blob)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            next_seq += 1;

            sqlx::query("DELETE FROM resource_attributes WHERE collection = ? AND resource_id = ?")
                .bind(&self.collection)
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;

            for (field, token) in a.tokens() {
                sqlx::query(
                    "INSERT OR IGNORE INTO resource_attributes \
                     (collection, resource_id, field, token) VALUES (?, ?, ?, ?)",
                )
                .bind(&self.collection)
                .bind(&record.id)
                .bind(field.as_str())
                .bind(token)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
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

        let mut binds = Vec::new();
        let clause = compile_predicate(predicate, &mut binds);
        let sql = format!(
            "SELECT {} FROM resources r WHERE r.collection = ? AND {} ORDER BY r.seq",
            RECORD_COLUMNS, clause
        );

        let mut query = sqlx::query(&sql).bind(&self.collection);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let candidates: Vec<SearchResult> = rows
            .iter()
            .map(|row| {
                let record = row_to_record(row);
                let distance = record
                    .embedding
                    .as_deref()
                    .map(|v| cosine_distance(query_vec, v))
                    .unwrap_or(1.0);
                SearchResult { record, distance }
            })
            .collect();

        let mut ranked = rank_candidates(candidates, k);
        let mut records: Vec<ResourceRecord> = ranked.iter().map(|r| r.record.clone()).collect();
        self.attach_attributes(&mut records).await?;
        for (result, record) in ranked.iter_mut().zip(records) {
            result.record = record;
        }
        Ok(ranked)
    }

    async fn list_all(&self, limit: Option<usize>) -> Result<Vec<ResourceRecord>> {
        let sql = format!(
            "SELECT {} FROM resources r WHERE r.collection = ? ORDER BY r.seq LIMIT ?",
            RECORD_COLUMNS
        );
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&sql)
            .bind(&self.collection)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut records: Vec<ResourceRecord> = rows.iter().map(row_to_record).collect();
        self.attach_attributes(&mut records).await?;
        Ok(records)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0u64;
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        for chunk in ids.chunks(ID_CHUNK) {
            let marks = placeholders(chunk.len());

            let sql = format!(
                "DELETE FROM resource_attributes WHERE collection = ? AND resource_id IN ({})",
                marks
            );
            let mut query = sqlx::query(&sql).bind(&self.collection);
            for id in chunk {
                query = query.bind(id);
            }
            query.execute(&mut *tx).await?;

            let sql = format!(
                "DELETE FROM resources WHERE collection = ? AND id IN ({})",
                marks
            );
            let mut query = sqlx::query(&sql).bind(&self.collection);
            for id in chunk {
                query = query.bind(id);
            }
            removed += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
