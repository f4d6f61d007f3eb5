//! Structured-query agent.
//!
//! Reads the question against the list of valid report identifiers and
//! returns search text plus filter values. Validation against the catalog
//! happens afterwards in [`FilterPlan::resolve`](crate::retrieval::FilterPlan::resolve).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::prompt::build_self_query_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::config::AssistantConfig;
use crate::core::CollectionDescriptor;
use crate::error::AgentError;
use crate::retrieval::{ReportCatalog, StructuredQuery};

/// Agent producing a [`StructuredQuery`].
pub struct SelfQueryAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    system_prompt: String,
}

impl SelfQueryAgent {
    /// Creates the agent from process configuration and its system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.filter_model.clone(),
            max_tokens: config.filter_max_tokens,
            temperature: config.temperature,
            timeout: config.llm_timeout,
            system_prompt,
        }
    }

    /// Asks the model to structure `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or the answer is not a JSON
    /// object.
    pub async fn structure(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        reports: &ReportCatalog,
        collections: &[&CollectionDescriptor],
    ) -> Result<StructuredQuery, AgentError> {
        let user_msg = build_self_query_prompt(query, &reports.joined(), collections);
        let response = self.execute(provider, &user_msg).await?;
        let structured = StructuredQuery::parse(&response.content)?;
        debug!(
            query = %structured.query,
            report_ids = ?structured.report_ids,
            year = ?structured.insertion_year,
            "structured query"
        );
        Ok(structured)
    }
}

#[async_trait]
impl Agent for SelfQueryAgent {
    fn name(&self) -> &'static str {
        "self-query"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for SelfQueryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfQueryAgent")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
