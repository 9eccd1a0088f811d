//! Generation providers that turn a prompt into model text

pub mod client;
pub mod gemini;
pub mod response;
pub mod subprocess_client;

use crate::core::config::{ProviderKind, ProviderSettings};
use async_trait::async_trait;
pub use client::ProviderConfig;
pub use gemini::GeminiClient;
pub use response::{GenerationOptions, ProviderError};
pub use subprocess_client::CommandProvider;

/// Trait for text generation - allows for different implementations
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Send a prompt and return the full response text
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
impl<P: GenerationProvider + ?Sized> GenerationProvider for Box<P> {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        (**self).generate(prompt, options).await
    }
}

/// Construct the provider selected in settings
pub fn build_provider(
    settings: &ProviderSettings,
    api_key: Option<String>,
) -> Result<Box<dyn GenerationProvider>, ProviderError> {
    let config = ProviderConfig::from_settings(settings, api_key);
    match settings.kind {
        ProviderKind::Gemini => Ok(Box::new(GeminiClient::new(&config)?)),
        ProviderKind::Command => Ok(Box::new(CommandProvider::new(&config))),
    }
}
