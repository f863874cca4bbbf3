//! Star repository trait and implementation
//!
//! Stars are grouped by folder. The same `pid` may sit in several folders,
//! but at most once per folder.

use crate::error::{LibraryError, Result};
use crate::models::StarRecord;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

#[async_trait]
pub trait StarRepository: Send + Sync {
    /// Whether `pid` is starred in any folder.
    async fn exists(&self, pid: &str) -> Result<bool>;

    async fn exists_in_folder(&self, pid: &str, folder: &str) -> Result<bool>;

    /// Insert `record` into `folder`.
    ///
    /// Returns `false` when the folder already holds that `pid`; the stored
    /// record is left as it was.
    async fn add_to_folder(&self, record: &StarRecord, folder: &str) -> Result<bool>;

    /// Returns `true` if a record was removed.
    async fn remove_from_folder(&self, pid: &str, folder: &str) -> Result<bool>;

    /// Records of `folder` in insertion order. Unknown folders are empty.
    async fn get_folder(&self, folder: &str) -> Result<Vec<StarRecord>>;

    /// Replace one folder's content atomically. Other folders are untouched.
    async fn replace_folder(&self, folder: &str, records: &[StarRecord]) -> Result<()>;

    /// Names of all non-empty folders, sorted.
    async fn list_folders(&self) -> Result<Vec<String>>;
}

/// SQLite implementation of StarRepository
pub struct SqliteStarRepository {
    pool: SqlitePool,
}

impl SqliteStarRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate(record: &StarRecord, folder: &str) -> Result<()> {
        if folder.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "folder".to_string(),
                message: "folder name cannot be empty".to_string(),
            });
        }
        record.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "star".to_string(),
            message: msg,
        })
    }
}

#[async_trait]
impl StarRepository for SqliteStarRepository {
    async fn exists(&self, pid: &str) -> Result<bool> {
        let found: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM star_items WHERE pid = ?)")
            .bind(pid)
            .fetch_one(&self.pool)
            .await?;

        Ok(found.0 != 0)
    }

    async fn exists_in_folder(&self, pid: &str, folder: &str) -> Result<bool> {
        let found: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM star_items WHERE folder = ? AND pid = ?)",
        )
        .bind(folder)
        .bind(pid)
        .fetch_one(&self.pool)
        .await?;

        Ok(found.0 != 0)
    }

    async fn add_to_folder(&self, record: &StarRecord, folder: &str) -> Result<bool> {
        Self::validate(record, folder)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO star_items (folder, pid, course, subject, "type", time)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(folder)
        .bind(&record.pid)
        .bind(record.course)
        .bind(record.subject)
        .bind(record.kind)
        .bind(&record.time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_folder(&self, pid: &str, folder: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM star_items WHERE folder = ? AND pid = ?")
            .bind(folder)
            .bind(pid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_folder(&self, folder: &str) -> Result<Vec<StarRecord>> {
        let records = query_as::<_, StarRecord>(
            r#"
            SELECT pid, course, subject, "type", time
            FROM star_items
            WHERE folder = ?
            ORDER BY rowid
            "#,
        )
        .bind(folder)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn replace_folder(&self, folder: &str, records: &[StarRecord]) -> Result<()> {
        for record in records {
            Self::validate(record, folder)?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM star_items WHERE folder = ?")
            .bind(folder)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO star_items (folder, pid, course, subject, "type", time)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(folder)
            .bind(&record.pid)
            .bind(record.course)
            .bind(record.subject)
            .bind(record.kind)
            .bind(&record.time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(folder, records = records.len(), "Star folder replaced");
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT folder FROM star_items ORDER BY folder")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(folder,)| folder).collect())
    }
}
