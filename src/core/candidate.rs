//! Retrieved content fragments.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single retrieved fragment.
///
/// The score is set by vector search and replaced by reranking. Fusion
/// never modifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Point identifier in the vector store.
    pub id: String,
    /// Fragment text.
    pub text: String,
    /// Payload metadata, sorted by key.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Relevance score; higher is more relevant.
    pub score: f32,
}

impl Candidate {
    /// Creates a candidate without metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
            score,
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A candidate placed in the fused ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedCandidate {
    /// The reranked candidate.
    pub candidate: Candidate,
    /// Collection it was retrieved from.
    pub collection: String,
    /// Fusion weight of that collection.
    pub weight: f32,
    /// Zero-based position in the collection's reranked list.
    pub collection_rank: usize,
    /// Combined score used for ordering.
    pub fused_score: f64,
}

impl FusedCandidate {
    /// Renders the fragment text handed to the calling agent.
    ///
    /// The text is followed by a `metadata:` line listing payload fields in
    /// key order and the originating collection.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.candidate.text.trim_end().to_string();
        out.push_str("\nmetadata: ");
        for (key, value) in &self.candidate.metadata {
            let _ = write!(out, "{key}={}, ", display_value(value));
        }
        let _ = write!(out, "collection={}", self.collection);
        out
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
