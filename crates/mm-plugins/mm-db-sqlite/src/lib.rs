//! # mm-db-sqlite Implementation
//!
//! This module stores `mm-core` documents as JSON bodies in a single SQLite
//! table keyed by `(collection, id)`.

use async_trait::async_trait;
use mm_core::document::{apply_write, Document, Filter, WriteOp};
use mm_core::error::{StoreError, StoreResult};
use mm_core::traits::DocumentStore;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, SqliteExecutor};
use std::str::FromStr;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `url` and runs migrations.
    ///
    /// # Developer Note
    /// `sqlite::memory:` gives every connection its own database, so in-memory
    /// stores are pinned to a single connection that never expires.
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(1800)) })
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(url, "sqlite document store ready");
        Ok(Self { pool })
    }
}

fn parse_body(collection: &str, id: &str, body: &str) -> StoreResult<Document> {
    serde_json::from_str(body).map_err(|source| StoreError::Malformed {
        collection: collection.to_string(),
        id: id.to_string(),
        source,
    })
}

async fn fetch_body<'e, E: SqliteExecutor<'e>>(
    exec: E,
    collection: &str,
    id: &str,
) -> StoreResult<Option<Document>> {
    let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(StoreError::backend)?;

    match row {
        Some(row) => {
            let body: String = row.try_get("body").map_err(StoreError::backend)?;
            parse_body(collection, id, &body).map(Some)
        }
        None => Ok(None),
    }
}

/// Binds a JSON scalar using the SQLite type `json_extract` would produce for it.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::Bool(b) => query.bind(*b),
        Value::Null => query.bind(Option::<String>::None),
        other => query.bind(other.to_string()),
    }
}

/// Builds the narrowing WHERE clause. Rows are re-checked with `Filter::matches`,
/// since SQLite orders mixed types where the shared matcher does not.
fn where_clause(filters: &[Filter]) -> String {
    let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
    for filter in filters {
        let clause = match filter {
            Filter::Eq(..) => " AND json_extract(body, ?) = ?".to_string(),
            Filter::In(_, values) if values.is_empty() => " AND 0".to_string(),
            Filter::In(_, values) => {
                let marks = vec!["?"; values.len()].join(", ");
                format!(" AND json_extract(body, ?) IN ({marks})")
            }
            Filter::Gt(..) => " AND json_extract(body, ?) > ?".to_string(),
            Filter::Gte(..) => " AND json_extract(body, ?) >= ?".to_string(),
            Filter::Lt(..) => " AND json_extract(body, ?) < ?".to_string(),
            Filter::Lte(..) => " AND json_extract(body, ?) <= ?".to_string(),
        };
        sql.push_str(&clause);
    }
    sql
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_record(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        fetch_body(&self.pool, collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<(String, Document)>> {
        let sql = where_clause(filters);
        let mut query = sqlx::query(&sql).bind(collection);
        for filter in filters {
            match filter {
                Filter::In(_, values) if values.is_empty() => {}
                Filter::In(field, values) => {
                    query = query.bind(format!("$.{field}"));
                    for value in values {
                        query = bind_value(query, value);
                    }
                }
                Filter::Eq(field, value)
                | Filter::Gt(field, value)
                | Filter::Gte(field, value)
                | Filter::Lt(field, value)
                | Filter::Lte(field, value) => {
                    query = bind_value(query.bind(format!("$.{field}")), value);
                }
            }
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(StoreError::backend)?;
            let body: String = row.try_get("body").map_err(StoreError::backend)?;
            let doc = parse_body(collection, &id, &body)?;
            if filters.iter().all(|f| f.matches(&doc)) {
                results.push((id, doc));
            }
        }
        tracing::debug!(collection, hits = results.len(), "sqlite query");
        Ok(results)
    }

    /// Applies the batch inside one transaction.
    ///
    /// # Developer Note
    /// Returning early drops `tx`, which rolls back every write made so far.
    async fn commit_batch(&self, writes: Vec<WriteOp>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for op in writes {
            let (collection, id) = {
                let (c, i) = op.target();
                (c.to_string(), i.to_string())
            };
            let current = fetch_body(&mut *tx, &collection, &id).await?;
            let next = apply_write(current, op)?;
            let body = serde_json::to_string(&next).map_err(StoreError::backend)?;

            sqlx::query(
                "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?) \
                 ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body",
            )
            .bind(&collection)
            .bind(&id)
            .bind(body)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(())
    }
}
