//! stepgen - a step-by-step, LLM-assisted project generator

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod transport;

// Re-export commonly used types
pub use agent::{build_provider, GenerationOptions, GenerationProvider, ProviderError};
pub use core::{
    FileAction, PipelineError, ProjectConfig, ProjectLayout, Settings, Step, StepCatalog, StepKind,
    StepRunReport,
};
pub use execution::{PipelineEvent, RunOptions, StepPipeline};
pub use persistence::{HistoryBackend, RunRecord};
pub use transport::StdioServer;
