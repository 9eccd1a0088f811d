//! Local CLI provider - pipes the prompt to a subprocess and reads its stdout

use crate::agent::{GenerationOptions, GenerationProvider, ProviderConfig, ProviderError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Placeholder in `args` replaced by the requested model name
const MODEL_PLACEHOLDER: &str = "{model}";

/// Provider that runs a local model CLI (`pi`, `llm`, `ollama run`, ...)
#[derive(Debug, Clone)]
pub struct CommandProvider {
    /// Path to the executable
    command: String,

    /// Arguments; `{model}` is substituted per request
    args: Vec<String>,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl CommandProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            command: config.command.clone().unwrap_or_else(|| "pi".to_string()),
            args: config.args.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn args_for(&self, model: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(MODEL_PLACEHOLDER, model))
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for CommandProvider {
    /// Run the command with the prompt on stdin
    ///
    /// # Errors
    /// Returns `ProviderError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - The output is not valid UTF-8 or is empty
    /// - The command times out
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        debug!(
            "Spawning {} with prompt length: {}",
            self.command,
            prompt.len()
        );

        let mut child = Command::new(&self.command)
            .args(self.args_for(&options.model))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Internal(format!("Failed to execute {}: {}", self.command, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Internal("subprocess stdin unavailable".to_string()))?;
        let prompt = prompt.to_string();

        let run = async move {
            // A command that exits without reading its input is judged by its exit status
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
            drop(stdin);
            child.wait_with_output().await
        };

        let output = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout_secs))?
            .map_err(|e| ProviderError::Internal(format!("{} failed: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(ProviderError::Api {
                status: 0,
                message: format!("{} exited with code {}: {}", self.command, exit_code, stderr.trim()),
            });
        }

        let content = String::from_utf8(output.stdout).map_err(|e| {
            ProviderError::Internal(format!("Failed to decode {} output: {}", self.command, e))
        })?;

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("{} returned {} bytes of output", self.command, content.len());
        Ok(content)
    }
}
