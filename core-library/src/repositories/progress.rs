//! Progress repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::ProgressRecord;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

/// The local progress collection: a set of records keyed by `pid`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// All records in insertion order.
    async fn get_all(&self) -> Result<Vec<ProgressRecord>>;

    /// Replace the whole collection atomically.
    ///
    /// Later duplicates of a `pid` already in `records` are dropped, so the
    /// stored collection never holds two records with the same `pid`.
    async fn replace_all(&self, records: &[ProgressRecord]) -> Result<()>;

    async fn exists(&self, pid: &str) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of ProgressRepository
pub struct SqliteProgressRepository {
    pool: SqlitePool,
}

impl SqliteProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepository for SqliteProgressRepository {
    async fn get_all(&self) -> Result<Vec<ProgressRecord>> {
        let records = query_as::<_, ProgressRecord>(
            r#"SELECT pid, course, subject, "type", time FROM user_progress ORDER BY rowid"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn replace_all(&self, records: &[ProgressRecord]) -> Result<()> {
        for record in records {
            record.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "progress".to_string(),
                message: msg,
            })?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_progress")
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO user_progress (pid, course, subject, "type", time)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.pid)
            .bind(record.course)
            .bind(record.subject)
            .bind(record.kind)
            .bind(&record.time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(records = records.len(), "Progress collection replaced");
        Ok(())
    }

    async fn exists(&self, pid: &str) -> Result<bool> {
        let found: (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM user_progress WHERE pid = ?)")
                .bind(pid)
                .fetch_one(&self.pool)
                .await?;

        Ok(found.0 != 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_progress")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
