//! External capabilities bundled for injection into the orchestrator.

use std::sync::Arc;

use crate::agent::provider::LlmProvider;
use crate::config::AssistantConfig;
use crate::error::ConfigError;
use crate::retrieval::{Embedder, RerankerPool, VectorStore};

/// Everything the orchestrator talks to outside the process.
///
/// Built once per process. Tests assemble it from fakes.
#[derive(Clone)]
pub struct Services {
    /// Chat provider; only LLM-driven profiles need one.
    pub llm: Option<Arc<dyn LlmProvider>>,
    /// Vector store.
    pub store: Arc<dyn VectorStore>,
    /// Query embedder.
    pub embedder: Arc<dyn Embedder>,
    /// Reranker models.
    pub rerankers: Arc<dyn RerankerPool>,
}

impl Services {
    /// Bundles the retrieval capabilities without a chat provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        rerankers: Arc<dyn RerankerPool>,
    ) -> Self {
        Self {
            llm: None,
            store,
            embedder,
            rerankers,
        }
    }

    /// Adds a chat provider.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Builds the production stack: `OpenAI`, Qdrant and fastembed.
    ///
    /// The chat provider is only created when an API key is configured.
    /// Models load lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the Qdrant client cannot be built or the
    /// configured provider is unknown.
    #[cfg(all(feature = "qdrant", feature = "fastembed-models"))]
    pub fn from_config(config: &AssistantConfig) -> Result<Self, ConfigError> {
        use crate::retrieval::{FastembedEmbedder, FastembedRerankerPool, QdrantStore};

        let store = QdrantStore::connect(
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            config.search_timeout,
        )
        .map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;

        let services = Self::new(
            Arc::new(store),
            Arc::new(FastembedEmbedder::new(config.embed_cache_dir.clone())),
            Arc::new(FastembedRerankerPool::new(config.model_dir.clone())),
        );

        if config.api_key.is_some() {
            Ok(services.with_llm(crate::agent::client::create_provider(config)?))
        } else {
            Ok(services)
        }
    }

    /// Without the `qdrant` and `fastembed-models` features there is no
    /// production stack.
    ///
    /// # Errors
    ///
    /// Always returns [`ConfigError::FeatureDisabled`].
    #[cfg(not(all(feature = "qdrant", feature = "fastembed-models")))]
    pub fn from_config(_config: &AssistantConfig) -> Result<Self, ConfigError> {
        let feature = if cfg!(feature = "qdrant") {
            "fastembed-models"
        } else {
            "qdrant"
        };
        Err(ConfigError::FeatureDisabled { feature })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("llm", &self.llm.as_ref().map(|p| p.name()))
            .field("store", &self.store.name())
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}
