//! Run result models

use crate::core::action::FileAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Why an action was not applied automatically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ReviewReason {
    /// New file, but auto-apply was off
    NewFileManualApply,
    /// Target already exists
    ExistingFile,
    /// Modifications are never applied automatically
    ModifyNotSupported,
    UnknownAction(String),
    InvalidPath(String),
    WriteFailed(String),
}

impl ReviewReason {
    /// Whether this item should flip the run's `ok` flag
    pub fn is_failure(&self) -> bool {
        matches!(self, ReviewReason::WriteFailed(_))
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::NewFileManualApply => write!(f, "new file, manual apply"),
            ReviewReason::ExistingFile => write!(f, "existing file, manual review"),
            ReviewReason::ModifyNotSupported => write!(f, "modification requires manual review"),
            ReviewReason::UnknownAction(op) => write!(f, "unknown action '{}'", op),
            ReviewReason::InvalidPath(reason) => write!(f, "invalid path: {}", reason),
            ReviewReason::WriteFailed(err) => write!(f, "write failed: {}", err),
        }
    }
}

/// A file written by the materializer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFile {
    /// Path as given in the action
    pub path: String,

    /// Where the file landed on disk
    pub written_to: PathBuf,

    pub bytes: usize,
}

/// An action left for the user to handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub path: String,
    pub reason: ReviewReason,

    /// Persisted plan that holds the full proposal for this file
    pub pointer: PathBuf,
}

/// Overall result of materializing a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Actions were extracted and every attempted write succeeded
    Materialized,
    /// The plan yielded no usable actions
    NoExtractableActions,
    /// At least one write failed
    WriteFailures,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Materialized => "materialized",
            RunOutcome::NoExtractableActions => "no_extractable_actions",
            RunOutcome::WriteFailures => "write_failures",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "materialized" => Some(RunOutcome::Materialized),
            "no_extractable_actions" => Some(RunOutcome::NoExtractableActions),
            "write_failures" => Some(RunOutcome::WriteFailures),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applied/review partition produced by the materializer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Materialization {
    pub applied: Vec<AppliedFile>,
    pub needs_review: Vec<ReviewItem>,
    pub ok: bool,
}

/// Typed result of running one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRunReport {
    pub run_id: Uuid,
    pub step_id: String,
    pub model: String,

    /// Where the raw plan was saved
    pub plan_path: PathBuf,

    /// Raw plan text
    pub plan: String,

    /// Actions in scheduled order, after truncation
    pub actions: Vec<FileAction>,

    pub applied: Vec<AppliedFile>,
    pub needs_review: Vec<ReviewItem>,

    /// False only when a write was attempted and failed
    pub ok: bool,

    pub outcome: RunOutcome,

    /// Notes from action extraction (dropped items, parse failures)
    pub parse_diagnostics: Vec<String>,
}

impl StepRunReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn review_count(&self) -> usize {
        self.needs_review.len()
    }
}

/// Result of bootstrapping a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub agent_dir: PathBuf,
    pub config_path: PathBuf,

    /// Template directory actually used, if one was found
    pub template_directory: Option<PathBuf>,

    /// Spec files filled from a model response
    pub generated: Vec<String>,

    /// Templates that were missing and replaced by a placeholder outline
    pub placeholder_templates: Vec<String>,

    /// Spec files written as an error notice because generation failed
    pub failed: Vec<String>,
}
