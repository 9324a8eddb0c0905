use anyhow::Result;
use sqlx::SqlitePool;

/// Create the index schema. Safe to run on every startup.
///
/// - `collections`: one row per named collection, tagged with the
///   embedding model and dimensionality it was built with.
/// - `resources`: one row per record; `seq` is the insertion position.
/// - `resource_attributes`: set-valued attributes, one row per token.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            year TEXT,
            url TEXT,
            relevance TEXT,
            file_path TEXT NOT NULL DEFAULT '',
            embedding BLOB NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resource_attributes (
            collection TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            field TEXT NOT NULL,
            token TEXT NOT NULL,
            PRIMARY KEY (collection, resource_id, field, token),
            FOREIGN KEY (collection, resource_id)
                REFERENCES resources(collection, id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_seq ON resources(collection, seq)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attributes_lookup \
         ON resource_attributes(collection, field, token)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
