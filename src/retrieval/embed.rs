//! Query embedding capability.
//!
//! Embedding is synchronous and CPU-bound; async callers run it on the
//! blocking pool.

use crate::error::RetrievalError;

/// Turns text into a dense vector in the space the collections were indexed in.
pub trait Embedder: Send + Sync {
    /// Model name for logging.
    fn name(&self) -> &str;

    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Embedding`] if the model fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}
