//! Tool settings loaded from YAML
//!
//! Settings are read once at startup and handed to each component at
//! construction; nothing reads them from process-wide state afterwards.

use crate::core::action::validate_relative_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model used when neither the CLI nor the project config names one
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-exp-03-25";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the per-project state directory
    pub agent_dir: String,

    /// Generation provider selection and limits
    pub provider: ProviderSettings,

    /// Limits for trimming incomplete code bodies
    pub truncation: TruncationPolicy,
}

/// Which provider implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Gemini `generateContent` HTTP API
    Gemini,
    /// A local CLI that reads the prompt on stdin and prints the reply
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,

    /// Model used when the project config has none
    pub default_model: String,

    /// API base URL (Gemini only)
    pub base_url: String,

    /// Environment variable holding the API key (Gemini only)
    pub api_key_env: String,

    /// Executable to run (Command only)
    pub command: Option<String>,

    /// Extra arguments passed to the executable (Command only)
    pub args: Vec<String>,

    /// Upper bound for a single provider call, in seconds
    pub timeout_secs: u64,
}

/// Truncation limits for incomplete code actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationPolicy {
    /// Content must be longer than this many characters to be truncated
    pub threshold_chars: usize,

    /// Content must have more lines than this to be truncated
    pub min_lines: usize,

    /// Lines kept from the top (imports and declarations)
    pub head_lines: usize,

    /// Lines kept from the bottom (closing structure)
    pub tail_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_dir: ".agent".to_string(),
            provider: ProviderSettings::default(),
            truncation: TruncationPolicy::default(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            default_model: DEFAULT_MODEL.to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            command: None,
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            threshold_chars: 4000,
            min_lines: 60,
            head_lines: 20,
            tail_lines: 10,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings for this invocation
    ///
    /// An explicit path must exist. Otherwise the per-user settings file is
    /// used when present, and built-in defaults when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/stepgen/settings.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stepgen").join("settings.yaml"))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        validate_relative_path(&self.agent_dir)
            .map_err(|e| anyhow::anyhow!("agent_dir: {}", e))?;

        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be greater than zero");
        }

        if self.provider.default_model.trim().is_empty() {
            anyhow::bail!("provider.default_model must not be empty");
        }

        if self.provider.kind == ProviderKind::Command
            && self
                .provider
                .command
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
        {
            anyhow::bail!("provider.command is required when provider.kind is 'command'");
        }

        let t = &self.truncation;
        if t.min_lines <= t.head_lines + t.tail_lines {
            anyhow::bail!(
                "truncation.min_lines ({}) must exceed head_lines + tail_lines ({})",
                t.min_lines,
                t.head_lines + t.tail_lines
            );
        }

        Ok(())
    }
}
