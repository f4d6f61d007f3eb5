//! Vector store capability and metadata predicates.
//!
//! The store is consumed, not implemented here: ingestion and indexing
//! happen elsewhere. [`VectorStore`] is the seam the retrievers search
//! through, implemented by the Qdrant adapter and by in-memory fakes.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::Candidate;
use crate::error::RetrievalError;

/// One equality constraint on a metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldCondition {
    /// Attribute equals the value.
    Equals {
        /// Attribute name as stored in the payload metadata.
        field: String,
        /// Required value.
        value: String,
    },
    /// Attribute equals any of the values.
    AnyOf {
        /// Attribute name as stored in the payload metadata.
        field: String,
        /// Accepted values.
        values: Vec<String>,
    },
}

impl FieldCondition {
    /// Attribute this condition constrains.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::AnyOf { field, .. } => field,
        }
    }

    /// Returns `true` if `value` satisfies the condition.
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(actual) = value.and_then(Value::as_str) else {
            return false;
        };
        match self {
            Self::Equals { value, .. } => actual == value,
            Self::AnyOf { values, .. } => values.iter().any(|v| v == actual),
        }
    }
}

/// Conjunction of field conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataFilter {
    conditions: Vec<FieldCondition>,
}

impl MetadataFilter {
    /// Creates an empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn and(mut self, condition: FieldCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[FieldCondition] {
        &self.conditions
    }

    /// Returns `true` when the filter has no conditions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against candidate metadata.
    #[must_use]
    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.conditions
            .iter()
            .all(|c| c.matches(candidate.metadata.get(c.field())))
    }
}

/// Vector similarity search over named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Returns up to `k` candidates nearest to `vector` in `collection`,
    /// best first, restricted by `filter` when given.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] when the store is unreachable or the
    /// collection does not exist.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, RetrievalError>;

    /// Returns the payload of the first point in `collection`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] on store failures.
    async fn first_payload(
        &self,
        collection: &str,
    ) -> Result<Option<Map<String, Value>>, RetrievalError>;
}
