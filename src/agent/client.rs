//! Provider client configuration

use crate::core::config::ProviderSettings;

/// Configuration for a generation provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API base URL for HTTP providers
    pub base_url: String,

    /// API key for HTTP providers
    pub api_key: Option<String>,

    /// Executable for the command provider
    ///
    /// If not provided, defaults to "pi" (assumes it's on PATH).
    pub command: Option<String>,

    /// Arguments passed before the prompt is written to stdin
    pub args: Vec<String>,

    /// Timeout for requests in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            command: None,
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from settings, reading the API key from the configured env var
    /// unless one is given explicitly
    pub fn from_settings(settings: &ProviderSettings, api_key: Option<String>) -> Self {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&settings.api_key_env).ok())
            .filter(|k| !k.trim().is_empty());

        Self {
            base_url: settings.base_url.clone(),
            api_key,
            command: settings.command.clone(),
            args: settings.args.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
