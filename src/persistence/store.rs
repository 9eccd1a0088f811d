//! SQLite-based run history store

use crate::core::RunOutcome;
use crate::persistence::{HistoryBackend, RunRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, step_id, model, started_at, completed_at, outcome, ok, \
                              applied_count, review_count, error FROM runs";

/// SQLite run history
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    /// Ephemeral store, for tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // One connection: runs are recorded sequentially and `:memory:` is per connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to history database")?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                step_id TEXT NOT NULL,
                model TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                outcome TEXT,
                ok INTEGER NOT NULL,
                applied_count INTEGER NOT NULL DEFAULT 0,
                review_count INTEGER NOT NULL DEFAULT 0,
                error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_step_started ON runs(step_id, started_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<RunRecord> {
        Ok(RunRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            step_id: row.get("step_id"),
            model: row.get("model"),
            started_at: Self::from_naive(row.get("started_at")),
            completed_at: Self::from_naive(row.get("completed_at")),
            outcome: row
                .get::<Option<String>, _>("outcome")
                .as_deref()
                .and_then(RunOutcome::parse),
            ok: row.get::<i64, _>("ok") != 0,
            applied_count: row.get::<i64, _>("applied_count") as usize,
            review_count: row.get::<i64, _>("review_count") as usize,
            error: row.get("error"),
        })
    }
}

#[async_trait::async_trait]
impl HistoryBackend for SqliteHistoryStore {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, step_id, model, started_at, completed_at, outcome, ok, applied_count, review_count, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(&run.step_id)
        .bind(&run.model)
        .bind(Self::to_naive(run.started_at))
        .bind(Self::to_naive(run.completed_at))
        .bind(run.outcome.map(|o| o.as_str()))
        .bind(i64::from(run.ok))
        .bind(run.applied_count as i64)
        .bind(run.review_count as i64)
        .bind(run.error.as_deref())
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load run")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list(&self, step_id: Option<&str>, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE (?1 IS NULL OR step_id = ?1) ORDER BY started_at DESC LIMIT ?2",
            SELECT_COLUMNS
        ))
        .bind(step_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::from_row).collect()
    }
}
