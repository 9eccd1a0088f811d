//! Persistence layer for run history and project locking

pub mod lock;
#[cfg(feature = "sqlite")]
pub mod store;

pub use lock::ProjectLock;
#[cfg(feature = "sqlite")]
pub use store::SqliteHistoryStore;

use crate::core::{ProjectLayout, RunOutcome, StepRunReport};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `generate` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run ID
    pub run_id: Uuid,

    pub step_id: String,
    pub model: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// `None` when the run aborted before materialization
    pub outcome: Option<RunOutcome>,

    pub ok: bool,
    pub applied_count: usize,
    pub review_count: usize,

    /// Error message of an aborted run
    pub error: Option<String>,
}

impl RunRecord {
    /// Record for a run that produced a report
    pub fn from_report(report: &StepRunReport, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: report.run_id,
            step_id: report.step_id.clone(),
            model: report.model.clone(),
            started_at,
            completed_at: Utc::now(),
            outcome: Some(report.outcome),
            ok: report.ok,
            applied_count: report.applied_count(),
            review_count: report.review_count(),
            error: None,
        }
    }

    /// Record for a run that aborted with an error
    pub fn failed(
        run_id: Uuid,
        step_id: &str,
        model: &str,
        started_at: DateTime<Utc>,
        error: &str,
    ) -> Self {
        Self {
            run_id,
            step_id: step_id.to_string(),
            model: model.to_string(),
            started_at,
            completed_at: Utc::now(),
            outcome: None,
            ok: false,
            applied_count: 0,
            review_count: 0,
            error: Some(error.to_string()),
        }
    }

    /// Short status label for listings
    pub fn status(&self) -> &str {
        self.outcome.as_ref().map_or("failed", RunOutcome::as_str)
    }
}

/// Trait for history backends
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Save a run record
    async fn record(&self, run: &RunRecord) -> Result<()>;

    /// Load a run by ID
    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>>;

    /// Most recent runs first, optionally for one step only
    async fn list(&self, step_id: Option<&str>, limit: usize) -> Result<Vec<RunRecord>>;
}

/// In-memory history (for testing or when built without SQLite)
#[derive(Default)]
pub struct InMemoryHistory {
    runs: tokio::sync::RwLock<Vec<RunRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.retain(|r| r.run_id != run.run_id);
        runs.push(run.clone());
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn list(&self, step_id: Option<&str>, limit: usize) -> Result<Vec<RunRecord>> {
        let runs = self.runs.read().await;
        let mut matching: Vec<RunRecord> = runs
            .iter()
            .filter(|r| step_id.map_or(true, |s| s == r.step_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// Open the history backend for a project
///
/// Uses `<agent_dir>/history.db` when built with SQLite, memory otherwise.
pub async fn open_history(layout: &ProjectLayout) -> Result<Box<dyn HistoryBackend>> {
    #[cfg(feature = "sqlite")]
    {
        let store = SqliteHistoryStore::new(&layout.history_path()).await?;
        Ok(Box::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = layout;
        Ok(Box::new(InMemoryHistory::new()))
    }
}
