//! Provider request options and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for generation providers
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Generation stopped early: {0}")]
    Incomplete(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Provider not configured: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Per-request options passed to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier, e.g. `gemini-2.5-pro-exp-03-25`
    pub model: String,

    /// Sampling temperature, provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}
