//! Pluggable LLM provider trait.
//!
//! Implementations translate [`ChatRequest`]/[`ChatResponse`] into SDK
//! calls. Planning and structured-query logic never see the SDK.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name, e.g. `"openai"`.
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or unreadable responses.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}
