//! Cross-encoder reranking of a collection's candidates.
//!
//! [`rerank_candidates`] owns the contract: passages are truncated to the
//! profile's maximum length, scored against the query, sorted by score
//! descending and cut to `min(n, len)`. A request for zero results never
//! touches the model.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::core::{Candidate, RerankerModel};
use crate::error::RetrievalError;

/// A loaded cross-encoder.
pub trait Reranker: Send + Sync {
    /// Model identifier.
    fn model_id(&self) -> &str;

    /// Scores each passage against `query`; one score per passage, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Rerank`] if inference fails.
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError>;
}

/// Source of rerankers keyed by model and maximum passage length.
///
/// Implementations load lazily and share loaded models across requests.
pub trait RerankerPool: Send + Sync {
    /// Returns the reranker for `model` configured for `max_length` tokens.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Rerank`] if the model cannot be loaded.
    fn get(
        &self,
        model: RerankerModel,
        max_length: usize,
    ) -> Result<Arc<dyn Reranker>, RetrievalError>;
}

/// Cuts `text` after `max_words` words, keeping the original separators.
///
/// Words are Unicode word segments; a word never yields fewer tokens than
/// one, so this is a cheap upper bound on what the tokenizer keeps.
#[must_use]
pub fn truncate_passage(text: &str, max_words: usize) -> &str {
    if max_words == 0 {
        return "";
    }
    let mut words = 0usize;
    for (idx, segment) in text.split_word_bound_indices() {
        if segment.chars().any(char::is_alphanumeric) {
            if words == max_words {
                return text[..idx].trim_end();
            }
            words += 1;
        }
    }
    text
}

/// Reranks `candidates` against `query` and keeps the best `n`.
///
/// The returned scores are the reranker's and are non-increasing. Equal
/// scores keep their retrieval order.
///
/// # Errors
///
/// Returns [`RetrievalError::Rerank`] if scoring fails or the model returns
/// the wrong number of scores.
pub fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<Candidate>,
    n: usize,
    max_passage_length: usize,
) -> Result<Vec<Candidate>, RetrievalError> {
    if n == 0 || candidates.is_empty() {
        return Ok(Vec::new());
    }

    let passages: Vec<&str> = candidates
        .iter()
        .map(|c| truncate_passage(&c.text, max_passage_length))
        .collect();
    let scores = reranker.score(query, &passages)?;
    if scores.len() != candidates.len() {
        return Err(RetrievalError::Rerank {
            model: reranker.model_id().to_string(),
            message: format!(
                "expected {} scores, got {}",
                candidates.len(),
                scores.len()
            ),
        });
    }

    let mut scored: Vec<Candidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(mut c, s)| {
            c.score = if s.is_nan() { f32::NEG_INFINITY } else { s };
            c
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(n);
    Ok(scored)
}
