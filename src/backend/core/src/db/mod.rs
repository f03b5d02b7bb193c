//! Database layer for Postwatch.
//!
//! Uses SQLite through sqlx. Two tables:
//! - `posts`: the current result set, replaced wholesale by every successful run
//! - `scraping_history`: append-only run log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::collector::PostPayload;
use crate::error::{ErrorCode, ErrorContext, PostwatchError, Result};

/// Database connection and operations.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and create if missing) the database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_error_code(ErrorCode::InvalidConfiguration)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        info!(url = %database_url, "Database connected");
        Ok(Self { pool })
    }

    /// A private in-memory database on a single pinned connection.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                image_url TEXT NOT NULL,
                local_image_path TEXT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scraping_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_last_seen ON posts (last_seen)")
            .execute(&self.pool)
            .await?;

        debug!("Database schema ready");
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Post Operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace the whole result set in one transaction.
    ///
    /// On error the transaction is rolled back on drop and the previous rows
    /// stay in place.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn replace_posts(&self, records: &[PostRecord]) -> Result<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| transaction_error("begin", e))?;

        sqlx::query("DELETE FROM posts").execute(&mut *tx).await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO posts (url, image_url, local_image_path, title, description, first_seen, last_seen)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
            )
            .bind(&record.post.url)
            .bind(&record.post.image_url)
            .bind(&record.local_image_path)
            .bind(&record.post.title)
            .bind(&record.post.description)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| transaction_error("commit", e))?;

        Ok(())
    }

    /// Most recently seen posts first; insertion order breaks ties.
    pub async fn latest_posts(&self, limit: i64) -> Result<Vec<StoredPost>> {
        let rows = sqlx::query_as::<_, StoredPost>(
            r#"
            SELECT id, url, image_url, local_image_path, title, description, first_seen, last_seen
            FROM posts
            ORDER BY last_seen DESC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Get total post count.
    pub async fn count_posts(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // History Operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Append one history row.
    pub async fn log_history(
        &self,
        status: HistoryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraping_history (timestamp, status, error_message)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(Utc::now())
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest entries first; higher id wins on equal timestamps.
    pub async fn history(&self, limit: i64) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, timestamp, status, error_message
            FROM scraping_history
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

fn transaction_error(stage: &str, error: sqlx::Error) -> PostwatchError {
    PostwatchError::with_internal(
        ErrorCode::DatabaseTransactionFailed,
        "Failed to store posts",
        format!("{} failed: {}", stage, error),
    )
    .with_source(error)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

/// A post ready to be written, with its cached image if any.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post: PostPayload,
    pub local_image_path: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: i64,
    pub url: String,
    pub image_url: String,
    pub local_image_path: Option<String>,
    pub title: String,
    pub description: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub status: HistoryStatus,
    pub error_message: Option<String>,
}

/// Kind of a history row, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum HistoryStatus {
    Started,
    Completed,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
