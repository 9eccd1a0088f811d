//! Pipeline error taxonomy

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the step generation pipeline
///
/// Per-action kinds (`InvalidPath`, `WriteFailed`) are recorded in the run
/// report instead of aborting the batch; the rest abort the operation that
/// raised them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unknown step '{step}'. Available steps: {available}")]
    UnknownStep { step: String, available: String },

    #[error("No step follows '{0}'. Name the step to run explicitly")]
    NoNextStep(String),

    #[error("Specification template not found for step '{step}': {path}")]
    TemplateNotFound { step: String, path: PathBuf },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error("Could not extract file actions from plan: {0}")]
    PlanParseFailed(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Failed to write '{}': {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Setting key '{key}' is not allowed. Allowed keys: {allowed}")]
    ConfigKeyNotAllowed { key: String, allowed: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidConfigValue { key: String, reason: String },

    #[error("Project not initialized: {} not found. Run 'stepgen init' first", .0.display())]
    NotInitialized(PathBuf),

    #[error("Project already initialized at {}. Use --force to overwrite", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("Another stepgen process holds the project lock at {}", .0.display())]
    ProjectLocked(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
