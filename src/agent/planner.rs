//! Collection planner.
//!
//! Fixed profiles return their preconfigured plan without a model call.
//! LLM-driven profiles ask the planner model once; any failure past that
//! point (transport, timeout, malformed JSON) is logged with the raw text
//! and becomes an empty plan.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::prompt::build_planner_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::config::AssistantConfig;
use crate::core::{CollectionCatalog, CollectionPlan, PlanningMode, QueryContext};
use crate::error::ConfigError;

/// Agent that selects collections and depths for a query.
pub struct CollectionPlanner {
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    system_prompt: String,
}

impl CollectionPlanner {
    /// Creates a planner from process configuration and its system prompt.
    #[must_use]
    pub fn new(config: &AssistantConfig, system_prompt: String) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            temperature: config.temperature,
            timeout: config.llm_timeout,
            system_prompt,
        }
    }

    /// Produces the plan for `ctx`.
    ///
    /// Fixed plans are checked against `catalog`. LLM-driven plans are
    /// parsed against it, then the profile's depth override is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCollection`] when a fixed plan names a
    /// collection outside the catalog, and [`ConfigError::ApiKeyMissing`]
    /// when an LLM-driven profile runs without a provider. Model failures
    /// are not errors.
    pub async fn plan(
        &self,
        provider: Option<&dyn LlmProvider>,
        ctx: &QueryContext,
        catalog: &CollectionCatalog,
    ) -> Result<CollectionPlan, ConfigError> {
        match &ctx.profile.planning_mode {
            PlanningMode::Fixed { plan } => {
                if let Some(unknown) = plan.entries().iter().find(|e| !catalog.contains(&e.collection))
                {
                    return Err(ConfigError::UnknownCollection {
                        name: unknown.collection.clone(),
                    });
                }
                debug!(profile = ctx.profile.label, %plan, "fixed plan");
                Ok(plan.clone())
            }
            PlanningMode::LlmDriven { depth_override } => {
                let provider = provider.ok_or(ConfigError::ApiKeyMissing)?;
                let plan = self.ask(provider, &ctx.raw_query, catalog).await;
                let plan = match depth_override {
                    Some(depth) => plan.with_uniform_depth(*depth),
                    None => plan,
                };
                debug!(profile = ctx.profile.label, %plan, "planned collections");
                Ok(plan)
            }
        }
    }

    async fn ask(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        catalog: &CollectionCatalog,
    ) -> CollectionPlan {
        let user_msg = build_planner_prompt(query, catalog);
        let response = match self.execute(provider, &user_msg).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "collection planner call failed");
                return CollectionPlan::empty();
            }
        };

        match CollectionPlan::parse(&response.content, catalog) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, raw = %response.content, "unparseable collection plan");
                CollectionPlan::empty()
            }
        }
    }
}

#[async_trait]
impl Agent for CollectionPlanner {
    fn name(&self) -> &'static str {
        "planner"
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

impl std::fmt::Debug for CollectionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionPlanner")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
