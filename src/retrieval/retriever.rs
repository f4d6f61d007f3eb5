//! Per-collection retrievers and the registry that maps collections to them.
//!
//! Every catalog collection is served by a [`CollectionRetriever`]. The
//! registry replaces a per-name branch chain: adding a collection means
//! registering another retriever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::store::{MetadataFilter, VectorStore};
use crate::core::{Candidate, CollectionCatalog, CollectionDescriptor, RetrievalStrategy};
use crate::error::{ConfigError, RetrievalError};

/// Candidates fetched per collection by the plain strategy.
pub const PLAIN_BREADTH: usize = 10;

/// A query already embedded, shared by every collection of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Text the vector was computed from.
    pub text: String,
    /// Query embedding.
    pub vector: Arc<[f32]>,
}

impl SearchQuery {
    /// Creates a search query.
    #[must_use]
    pub fn new(text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            vector: vector.into(),
        }
    }
}

/// Fetches candidates from one collection.
#[async_trait]
pub trait CollectionRetriever: Send + Sync {
    /// The collection this retriever serves.
    fn descriptor(&self) -> &CollectionDescriptor;

    /// Number of candidates fetched before reranking.
    fn breadth(&self, strategy: RetrievalStrategy, depth: usize) -> usize {
        match strategy {
            RetrievalStrategy::Plain => PLAIN_BREADTH,
            RetrievalStrategy::SelfQuery => self.descriptor().search_breadth.max(depth),
        }
    }

    /// Returns candidates for `query`, best first, restricted by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the search fails or times out.
    async fn retrieve(
        &self,
        query: &SearchQuery,
        strategy: RetrievalStrategy,
        depth: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, RetrievalError>;
}

/// Dense vector search over a single store collection.
pub struct VectorRetriever {
    descriptor: CollectionDescriptor,
    store: Arc<dyn VectorStore>,
    timeout: Duration,
}

impl VectorRetriever {
    /// Creates a retriever for `descriptor` searching `store`.
    #[must_use]
    pub fn new(
        descriptor: CollectionDescriptor,
        store: Arc<dyn VectorStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            descriptor,
            store,
            timeout,
        }
    }
}

#[async_trait]
impl CollectionRetriever for VectorRetriever {
    fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    async fn retrieve(
        &self,
        query: &SearchQuery,
        strategy: RetrievalStrategy,
        depth: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let k = self.breadth(strategy, depth);
        let collection = self.descriptor.store_name.as_str();
        let search = self.store.search(collection, &query.vector, k, filter);

        let mut candidates = tokio::time::timeout(self.timeout, search)
            .await
            .map_err(|_| RetrievalError::Timeout {
                collection: self.descriptor.name.clone(),
                stage: "search",
                seconds: self.timeout.as_secs(),
            })??;
        candidates.truncate(k);

        debug!(
            collection = %self.descriptor.name,
            k,
            filtered = filter.is_some(),
            hits = candidates.len(),
            "collection retrieved"
        );
        Ok(candidates)
    }
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("collection", &self.descriptor.name)
            .field("store", &self.store.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Collection name to retriever.
#[derive(Default)]
pub struct RetrieverRegistry {
    retrievers: HashMap<String, Arc<dyn CollectionRetriever>>,
}

impl RetrieverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a [`VectorRetriever`] for every catalog collection.
    #[must_use]
    pub fn for_catalog(
        catalog: &CollectionCatalog,
        store: &Arc<dyn VectorStore>,
        timeout: Duration,
    ) -> Self {
        let mut registry = Self::new();
        for descriptor in catalog.iter() {
            registry.register(Arc::new(VectorRetriever::new(
                descriptor.clone(),
                Arc::clone(store),
                timeout,
            )));
        }
        registry
    }

    /// Adds or replaces the retriever for its collection.
    pub fn register(&mut self, retriever: Arc<dyn CollectionRetriever>) {
        self.retrievers
            .insert(retriever.descriptor().name.clone(), retriever);
    }

    /// The retriever for `collection`, if registered.
    #[must_use]
    pub fn get(&self, collection: &str) -> Option<Arc<dyn CollectionRetriever>> {
        self.retrievers.get(collection).cloned()
    }

    /// Checks that every catalog collection has a retriever.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRetriever`] for the first uncovered
    /// collection.
    pub fn validate(&self, catalog: &CollectionCatalog) -> Result<(), ConfigError> {
        match catalog.iter().find(|d| !self.retrievers.contains_key(&d.name)) {
            Some(missing) => Err(ConfigError::MissingRetriever {
                collection: missing.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Number of registered retrievers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }
}

impl std::fmt::Debug for RetrieverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.retrievers.keys().collect();
        names.sort();
        f.debug_struct("RetrieverRegistry")
            .field("collections", &names)
            .finish()
    }
}
