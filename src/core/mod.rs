//! Core domain models for stepgen
//!
//! Steps and their catalog, file actions, project layout and configuration,
//! persisted step outputs, and run results.

pub mod action;
pub mod config;
pub mod context;
pub mod error;
pub mod layout;
pub mod project;
pub mod state;
pub mod step;

pub use action::*;
pub use config::{ProviderKind, ProviderSettings, Settings, TruncationPolicy, DEFAULT_MODEL};
pub use context::*;
pub use error::{PipelineError, Result};
pub use layout::{atomic_write, ProjectLayout};
pub use project::{ProjectConfig, ALLOWED_CONFIG_KEYS};
pub use state::*;
pub use step::*;
