//! Error types for pbi-context.
//!
//! Errors are split by how the orchestrator treats them: configuration
//! errors are fatal at the orchestrator boundary, while planning, retrieval,
//! and transport errors are recovered locally and degrade to fewer
//! collections.

use thiserror::Error;

/// Result alias used by the CLI and top-level entry points.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or programming defect.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Language-model transport error.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Retrieval pipeline error.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// CLI command error.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Profile name is not one of the five known profiles.
    #[error("unknown profile '{name}' (expected one of: max-speed, efficient, optimized, high-precision, max-accuracy)")]
    UnknownProfile {
        /// The rejected name.
        name: String,
    },

    /// A collection was requested that the catalog does not describe.
    #[error("unknown collection '{name}'")]
    UnknownCollection {
        /// The rejected collection name.
        name: String,
    },

    /// A catalog collection has no registered retriever.
    #[error("no retriever registered for collection '{collection}'")]
    MissingRetriever {
        /// Collection lacking a retriever.
        collection: String,
    },

    /// No API key for the language-model provider.
    #[error("API key missing: set OPENAI_API_KEY or PBI_API_KEY")]
    ApiKeyMissing,

    /// Provider name has no implementation.
    #[error("unsupported provider '{name}'")]
    UnsupportedProvider {
        /// The rejected provider name.
        name: String,
    },

    /// A capability was requested that was compiled out.
    #[error("feature '{feature}' is not enabled in this build")]
    FeatureDisabled {
        /// Cargo feature name.
        feature: &'static str,
    },

    /// Any other invalid setting.
    #[error("{message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Language-model call errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The provider rejected or failed the request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The call did not complete within its timeout.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Which call timed out.
        operation: &'static str,
        /// Configured timeout.
        seconds: u64,
    },

    /// The response could not be interpreted.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// Parse failure description.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// A tool call could not be executed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name as called.
        name: String,
        /// Failure description.
        message: String,
    },
}

/// Collection-plan parse errors. Recovered to an empty plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanParseError {
    /// Planner output is not JSON.
    #[error("planner output is not valid JSON: {message}")]
    InvalidJson {
        /// `serde_json` error text.
        message: String,
    },

    /// Planner output is JSON but not an object.
    #[error("planner output is not a JSON object")]
    NotAnObject,

    /// The `collections` key is present but not an array.
    #[error("'collections' is not an array")]
    CollectionsNotArray,
}

/// Per-collection retrieval errors. Recovered by dropping the collection.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Vector store unreachable or collection missing.
    #[error("vector search on '{collection}' failed: {message}")]
    Store {
        /// Collection being searched.
        collection: String,
        /// Store error message.
        message: String,
    },

    /// Query embedding failed.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Embedder error message.
        message: String,
    },

    /// Reranker could not be loaded or failed to score.
    #[error("rerank with '{model}' failed: {message}")]
    Rerank {
        /// Reranker model identifier.
        model: String,
        /// Failure description.
        message: String,
    },

    /// A per-collection stage exceeded its timeout.
    #[error("{stage} on '{collection}' timed out after {seconds}s")]
    Timeout {
        /// Collection being processed.
        collection: String,
        /// Pipeline stage (`search`, `rerank`).
        stage: &'static str,
        /// Configured timeout.
        seconds: u64,
    },

    /// The per-collection task panicked or was cancelled.
    #[error("task for '{collection}' failed: {message}")]
    TaskFailed {
        /// Collection being processed.
        collection: String,
        /// Join error text.
        message: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),
}
