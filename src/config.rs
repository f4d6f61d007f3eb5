//! Process configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Per-request inputs (profile name, report filter) are not part of this.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retrieval::fusion::FusionMethod;

/// Default LLM provider.
const DEFAULT_PROVIDER: &str = "openai";
/// Default model for collection planning and structured queries.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 5000;
/// Default structured-query max tokens.
const DEFAULT_FILTER_MAX_TOKENS: u32 = 1024;
/// Default language-model call timeout in seconds.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
/// Default vector search timeout in seconds.
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;
/// Default rerank timeout in seconds.
const DEFAULT_RERANK_TIMEOUT_SECS: u64 = 30;
/// Default maximum collections processed concurrently.
const DEFAULT_MAX_CONCURRENCY: usize = 6;
/// Default Qdrant gRPC endpoint.
const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
/// Application directory name under the user's data and cache dirs.
const APP_DIR: &str = "pbi-context";

/// Configuration for the retrieval assistant.
#[derive(Clone)]
pub struct AssistantConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider. Only LLM-driven profiles need it.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for collection planning.
    pub planner_model: String,
    /// Maximum tokens for planner responses.
    pub planner_max_tokens: u32,
    /// Sampling temperature for planning and structured queries.
    pub temperature: f32,
    /// Model for the structured-query (metadata filter) step.
    pub filter_model: String,
    /// Maximum tokens for structured-query responses.
    pub filter_max_tokens: u32,
    /// Timeout for each language-model call.
    pub llm_timeout: Duration,
    /// Timeout for each vector search (embedding included).
    pub search_timeout: Duration,
    /// Timeout for each rerank call.
    pub rerank_timeout: Duration,
    /// Maximum collections retrieved concurrently.
    pub max_concurrency: usize,
    /// Qdrant endpoint.
    pub qdrant_url: String,
    /// Qdrant API key.
    pub qdrant_api_key: Option<String>,
    /// Directory holding one folder per cross-encoder model.
    pub model_dir: PathBuf,
    /// Cache directory for downloaded embedding models.
    pub embed_cache_dir: PathBuf,
    /// Directory containing prompt template overrides.
    pub prompt_dir: Option<PathBuf>,
    /// Fusion numerics.
    pub fusion: FusionMethod,
}

impl AssistantConfig {
    /// Creates a new builder for `AssistantConfig`.
    #[must_use]
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an environment value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("planner_model", &self.planner_model)
            .field("filter_model", &self.filter_model)
            .field("llm_timeout", &self.llm_timeout)
            .field("search_timeout", &self.search_timeout)
            .field("rerank_timeout", &self.rerank_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("qdrant_url", &self.qdrant_url)
            .field("model_dir", &self.model_dir)
            .field("prompt_dir", &self.prompt_dir)
            .field("fusion", &self.fusion)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug, Clone, Default)]
pub struct AssistantConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    planner_model: Option<String>,
    planner_max_tokens: Option<u32>,
    temperature: Option<f32>,
    filter_model: Option<String>,
    filter_max_tokens: Option<u32>,
    llm_timeout: Option<Duration>,
    search_timeout: Option<Duration>,
    rerank_timeout: Option<Duration>,
    max_concurrency: Option<usize>,
    qdrant_url: Option<String>,
    qdrant_api_key: Option<String>,
    model_dir: Option<PathBuf>,
    embed_cache_dir: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    fusion: Option<FusionMethod>,
    fusion_name: Option<String>,
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl AssistantConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("PBI_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("PBI_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("PBI_BASE_URL"))
                .ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("PBI_PLANNER_MODEL").ok();
        }
        if self.filter_model.is_none() {
            self.filter_model = std::env::var("PBI_FILTER_MODEL").ok();
        }
        if self.llm_timeout.is_none() {
            self.llm_timeout = env_secs("PBI_LLM_TIMEOUT_SECS");
        }
        if self.search_timeout.is_none() {
            self.search_timeout = env_secs("PBI_SEARCH_TIMEOUT_SECS");
        }
        if self.rerank_timeout.is_none() {
            self.rerank_timeout = env_secs("PBI_RERANK_TIMEOUT_SECS");
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = std::env::var("PBI_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.qdrant_url.is_none() {
            self.qdrant_url = std::env::var("QDRANT_URL").ok();
        }
        if self.qdrant_api_key.is_none() {
            self.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok();
        }
        if self.model_dir.is_none() {
            self.model_dir = std::env::var("PBI_MODEL_DIR").ok().map(PathBuf::from);
        }
        if self.embed_cache_dir.is_none() {
            self.embed_cache_dir = std::env::var("PBI_EMBED_CACHE_DIR").ok().map(PathBuf::from);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("PBI_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.fusion.is_none() && self.fusion_name.is_none() {
            self.fusion_name = std::env::var("PBI_FUSION").ok();
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the planner max tokens.
    #[must_use]
    pub const fn planner_max_tokens(mut self, n: u32) -> Self {
        self.planner_max_tokens = Some(n);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the structured-query model.
    #[must_use]
    pub fn filter_model(mut self, model: impl Into<String>) -> Self {
        self.filter_model = Some(model.into());
        self
    }

    /// Sets the structured-query max tokens.
    #[must_use]
    pub const fn filter_max_tokens(mut self, n: u32) -> Self {
        self.filter_max_tokens = Some(n);
        self
    }

    /// Sets the language-model call timeout.
    #[must_use]
    pub const fn llm_timeout(mut self, duration: Duration) -> Self {
        self.llm_timeout = Some(duration);
        self
    }

    /// Sets the vector search timeout.
    #[must_use]
    pub const fn search_timeout(mut self, duration: Duration) -> Self {
        self.search_timeout = Some(duration);
        self
    }

    /// Sets the rerank timeout.
    #[must_use]
    pub const fn rerank_timeout(mut self, duration: Duration) -> Self {
        self.rerank_timeout = Some(duration);
        self
    }

    /// Sets the maximum concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the Qdrant endpoint.
    #[must_use]
    pub fn qdrant_url(mut self, url: impl Into<String>) -> Self {
        self.qdrant_url = Some(url.into());
        self
    }

    /// Sets the Qdrant API key.
    #[must_use]
    pub fn qdrant_api_key(mut self, key: impl Into<String>) -> Self {
        self.qdrant_api_key = Some(key.into());
        self
    }

    /// Sets the reranker model directory.
    #[must_use]
    pub fn model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    /// Sets the embedding model cache directory.
    #[must_use]
    pub fn embed_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.embed_cache_dir = Some(dir.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the fusion method.
    #[must_use]
    pub const fn fusion(mut self, method: FusionMethod) -> Self {
        self.fusion = Some(method);
        self
    }

    /// Builds the [`AssistantConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero timeout, zero
    /// concurrency, or an unknown fusion method name.
    pub fn build(self) -> Result<AssistantConfig, ConfigError> {
        let fusion = match (self.fusion, self.fusion_name) {
            (Some(method), _) => method,
            (None, Some(name)) => name.parse()?,
            (None, None) => FusionMethod::default(),
        };

        let llm_timeout = self
            .llm_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS));
        let search_timeout = self
            .search_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS));
        let rerank_timeout = self
            .rerank_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_RERANK_TIMEOUT_SECS));
        for (name, timeout) in [
            ("llm_timeout", llm_timeout),
            ("search_timeout", search_timeout),
            ("rerank_timeout", rerank_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be greater than zero"),
                });
            }
        }

        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "max_concurrency must be at least 1".to_string(),
            });
        }

        Ok(AssistantConfig {
            provider: self
                .provider
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            api_key: self.api_key.filter(|k| !k.trim().is_empty()),
            base_url: self.base_url,
            planner_model: self
                .planner_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            planner_max_tokens: self
                .planner_max_tokens
                .unwrap_or(DEFAULT_PLANNER_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(0.0),
            filter_model: self
                .filter_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            filter_max_tokens: self.filter_max_tokens.unwrap_or(DEFAULT_FILTER_MAX_TOKENS),
            llm_timeout,
            search_timeout,
            rerank_timeout,
            max_concurrency,
            qdrant_url: self
                .qdrant_url
                .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            qdrant_api_key: self.qdrant_api_key,
            model_dir: self.model_dir.unwrap_or_else(default_model_dir),
            embed_cache_dir: self.embed_cache_dir.unwrap_or_else(default_embed_cache_dir),
            prompt_dir: self.prompt_dir,
            fusion,
        })
    }
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("rerankers")
}

fn default_embed_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("fastembed")
}
