//! §6.4 — the persistent storage adapter, consumed (not defined) by this
//! specification, plus one concrete `SqliteStorage` implementation so the
//! manager binary runs end to end.
//!
//! `SqliteStorage` follows the same shape the donor crate uses for its own
//! durable keyed store (`src/link_index/mod.rs`: WAL-mode SQLite, a pooled
//! connection, one table keyed by the natural id).

use crate::error::StorageError;
use crate::model::UrlRecord;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// The operations the manager's pipeline needs from durable storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Up to `limit` records whose `visited` is null or old, in randomized
    /// order to spread re-visit load.
    async fn query_new_random(&self, limit: usize) -> Result<Vec<UrlRecord>, StorageError>;

    async fn query_by_url_one(&self, url: &str) -> Result<Option<UrlRecord>, StorageError>;

    async fn save(&self, record: &UrlRecord, force_update: bool) -> Result<bool, StorageError>;

    /// Bulk upsert. Returns one boolean-success per input record, in order.
    async fn update(
        &self,
        records: &[UrlRecord],
        all_or_nothing: bool,
        ensure_commit: bool,
    ) -> Result<Vec<bool>, StorageError>;

    /// Idempotent: storage may skip the write if the stored content length
    /// already matches.
    async fn save_content(
        &self,
        url: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;
}

/// SQLite-backed `Storage`.
pub struct SqliteStorage {
    pool: SqlitePool,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS url_records (
    url TEXT PRIMARY KEY,
    visited TEXT,
    headers TEXT NOT NULL DEFAULT '{}',
    status_code INTEGER,
    result TEXT,
    fetch_time_ms INTEGER,
    parent TEXT,
    redirects TEXT NOT NULL DEFAULT '[]',
    content BLOB,
    content_type TEXT,
    content_length INTEGER
);

CREATE INDEX IF NOT EXISTS idx_url_records_visited ON url_records(visited);
"#;

impl SqliteStorage {
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(dsn)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<UrlRecord, StorageError> {
        let headers_json: String = row.try_get("headers")?;
        let redirects_json: String = row.try_get("redirects")?;
        Ok(UrlRecord {
            url: row.try_get("url")?,
            visited: row.try_get("visited")?,
            headers: serde_json::from_str(&headers_json).unwrap_or_default(),
            status_code: row
                .try_get::<Option<i64>, _>("status_code")?
                .map(|v| v as u16),
            result: row.try_get("result")?,
            fetch_time_ms: row
                .try_get::<Option<i64>, _>("fetch_time_ms")?
                .map(|v| v as u64),
            parent: row.try_get("parent")?,
            redirects: serde_json::from_str(&redirects_json).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn query_new_random(&self, limit: usize) -> Result<Vec<UrlRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM url_records \
             WHERE visited IS NULL OR visited < datetime('now', '-6 hours') \
             ORDER BY RANDOM() LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn query_by_url_one(&self, url: &str) -> Result<Option<UrlRecord>, StorageError> {
        let row = sqlx::query("SELECT * FROM url_records WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn save(&self, record: &UrlRecord, force_update: bool) -> Result<bool, StorageError> {
        let headers_json = serde_json::to_string(&record.headers).unwrap_or_default();
        let redirects_json = serde_json::to_string(&record.redirects).unwrap_or_default();

        let result = if force_update {
            sqlx::query(
                "INSERT INTO url_records (url, visited, headers, status_code, result, fetch_time_ms, parent, redirects) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(url) DO UPDATE SET \
                    visited=excluded.visited, headers=excluded.headers, status_code=excluded.status_code, \
                    result=excluded.result, fetch_time_ms=excluded.fetch_time_ms, parent=excluded.parent, \
                    redirects=excluded.redirects",
            )
        } else {
            sqlx::query(
                "INSERT OR IGNORE INTO url_records (url, visited, headers, status_code, result, fetch_time_ms, parent, redirects) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
        }
        .bind(&record.url)
        .bind(&record.visited)
        .bind(headers_json)
        .bind(record.status_code.map(i64::from))
        .bind(&record.result)
        .bind(record.fetch_time_ms.map(|v| v as i64))
        .bind(&record.parent)
        .bind(redirects_json)
        .execute(&self.pool)
        .await?;

        Ok(force_update || result.rows_affected() > 0)
    }

    async fn update(
        &self,
        records: &[UrlRecord],
        all_or_nothing: bool,
        ensure_commit: bool,
    ) -> Result<Vec<bool>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            let headers_json = serde_json::to_string(&record.headers).unwrap_or_default();
            let redirects_json = serde_json::to_string(&record.redirects).unwrap_or_default();
            let res = sqlx::query(
                "INSERT INTO url_records (url, visited, headers, status_code, result, fetch_time_ms, parent, redirects) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(url) DO UPDATE SET \
                    visited=excluded.visited, headers=excluded.headers, status_code=excluded.status_code, \
                    result=excluded.result, fetch_time_ms=excluded.fetch_time_ms, parent=excluded.parent, \
                    redirects=excluded.redirects",
            )
            .bind(&record.url)
            .bind(&record.visited)
            .bind(headers_json)
            .bind(record.status_code.map(i64::from))
            .bind(&record.result)
            .bind(record.fetch_time_ms.map(|v| v as i64))
            .bind(&record.parent)
            .bind(redirects_json)
            .execute(&mut *tx)
            .await;

            match res {
                Ok(_) => outcomes.push(true),
                Err(e) if all_or_nothing => {
                    tx.rollback().await?;
                    return Err(StorageError::Sql(e));
                }
                Err(_) => outcomes.push(false),
            }
        }

        tx.commit().await?;
        if ensure_commit {
            // WAL checkpoint makes the commit durable across process restarts,
            // matching the donor adapter's `ensure_full_commit` semantics.
            sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
                .execute(&self.pool)
                .await
                .ok();
        }
        Ok(outcomes)
    }

    async fn save_content(
        &self,
        url: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let existing: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT content_length FROM url_records WHERE url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;

        if let Some((Some(len),)) = existing {
            if len as usize == content.len() {
                return Ok(());
            }
        }

        sqlx::query(
            "UPDATE url_records SET content = ?, content_type = ?, content_length = ? WHERE url = ?",
        )
        .bind(content)
        .bind(content_type)
        .bind(content.len() as i64)
        .bind(url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
