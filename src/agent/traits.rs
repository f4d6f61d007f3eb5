//! Agent trait definition.
//!
//! The collection planner and the structured-query agent both implement
//! this trait: a fixed system prompt, a model, and one bounded round trip.

use std::time::Duration;

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// A single-turn LLM role.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature.
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Upper bound on one round trip.
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Sends the system prompt and `user_msg` to `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Timeout`] when the call exceeds
    /// [`Agent::timeout`], or the provider's error.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let limit = self.timeout();
        let response: ChatResponse = tokio::time::timeout(limit, provider.chat(&request))
            .await
            .map_err(|_| AgentError::Timeout {
                operation: self.name(),
                seconds: limit.as_secs(),
            })??;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}
