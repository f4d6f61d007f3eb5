//! Retrieval pipeline: embedding, vector search, metadata filtering,
//! reranking and fusion.
//!
//! External capabilities are traits ([`VectorStore`], [`Embedder`],
//! [`Reranker`]) so the orchestrator can be driven by the production
//! adapters or by in-memory fakes.

pub mod embed;
#[cfg(feature = "fastembed-models")]
pub mod fastembed;
pub mod filter;
pub mod fusion;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod rerank;
pub mod retriever;
pub mod store;

pub use embed::Embedder;
#[cfg(feature = "fastembed-models")]
pub use fastembed::{FastembedEmbedder, FastembedReranker, FastembedRerankerPool};
pub use filter::{FilterPlan, ReportCatalog, ReportCatalogCache, StructuredQuery};
pub use fusion::{FusionMethod, FusionWeightTable, fuse};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantStore;
pub use rerank::{Reranker, RerankerPool, rerank_candidates, truncate_passage};
pub use retriever::{CollectionRetriever, RetrieverRegistry, SearchQuery, VectorRetriever};
pub use store::{FieldCondition, MetadataFilter, VectorStore};
