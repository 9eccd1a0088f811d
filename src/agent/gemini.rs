//! Gemini `generateContent` API client

use crate::agent::{GenerationOptions, GenerationProvider, ProviderConfig, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl GeminiClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "no Gemini API key (set GEMINI_API_KEY or pass --api-key)".to_string(),
            )
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn build_request_body(prompt: &str, options: &GenerationOptions) -> serde_json::Value {
        let mut body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
        });

        if let Some(temperature) = options.temperature {
            body["generationConfig"] = serde_json::json!({ "temperature": temperature });
        }

        body
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        debug!(
            "Sending prompt to {} ({} chars)",
            options.model,
            prompt.len()
        );

        let response = self
            .http
            .post(self.endpoint(&options.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request_body(prompt, options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}", status);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: extract_error_message(&message),
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("invalid response body: {}", e)))?;

        let text = body.into_text()?;
        debug!("Received {} chars from {}", text.len(), options.model);
        Ok(text)
    }
}

/// Pull `error.message` out of a Gemini error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| {
            f.block_reason.map(|r| match f.block_reason_message {
                Some(msg) => format!("{} - {}", r, msg),
                None => r,
            })
        }) {
            return Err(ProviderError::Blocked(reason));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                return Err(ProviderError::Incomplete(reason.to_string()));
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text)
    }
}
