//! Provider factory.

use std::sync::Arc;

use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::config::AssistantConfig;
use crate::error::ConfigError;

/// Creates the [`LlmProvider`] named by `config.provider`.
///
/// Supported: `"openai"` (any OpenAI-compatible endpoint via `async-openai`).
///
/// # Errors
///
/// Returns [`ConfigError::ApiKeyMissing`] when no API key is configured and
/// [`ConfigError::UnsupportedProvider`] for unknown names.
pub fn create_provider(config: &AssistantConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    let api_key = config.api_key.as_deref().ok_or(ConfigError::ApiKeyMissing)?;
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            api_key,
            config.base_url.as_deref(),
        ))),
        other => Err(ConfigError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
