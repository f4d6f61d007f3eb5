//! Qdrant-backed [`VectorStore`].
//!
//! Points are expected in the LangChain layout: the passage under
//! `page_content` and its attributes under a nested `metadata` object.
//! Metadata predicates therefore address `metadata.<field>`.
//!
//! Requires the `qdrant` feature flag.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, Filter, PointId, Query, QueryPointsBuilder, ScrollPointsBuilder,
    Value as QdrantValue,
};
use serde_json::{Map, Number, Value};
use tracing::debug;

use super::store::{FieldCondition, MetadataFilter, VectorStore};
use crate::core::Candidate;
use crate::error::RetrievalError;

const CONTENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";

/// Vector store over a Qdrant instance.
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Connects to `url`, authenticating with `api_key` when given.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Store`] if the client cannot be built.
    pub fn connect(
        url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key.map(str::to_string))
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Store {
                collection: String::new(),
                message: format!("failed to connect to {url}: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn store_error(collection: &str, e: impl std::fmt::Display) -> RetrievalError {
        RetrievalError::Store {
            collection: collection.to_string(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let mut request = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(vector.to_vec()))
            .limit(k as u64)
            .with_payload(true);
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            request = request.filter(to_qdrant_filter(filter));
        }

        let response = self
            .client
            .query(request)
            .await
            .map_err(|e| Self::store_error(collection, e))?;

        let candidates: Vec<Candidate> = response
            .result
            .into_iter()
            .map(|point| to_candidate(point.id, point.payload, point.score))
            .collect();
        debug!(collection, k, hits = candidates.len(), "qdrant search");
        Ok(candidates)
    }

    async fn first_payload(
        &self,
        collection: &str,
    ) -> Result<Option<Map<String, Value>>, RetrievalError> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .limit(1)
                    .with_payload(true),
            )
            .await
            .map_err(|e| Self::store_error(collection, e))?;

        Ok(response
            .result
            .into_iter()
            .next()
            .map(|point| payload_to_json(point.payload)))
    }
}

/// Translates a metadata predicate into a Qdrant `must` filter.
fn to_qdrant_filter(filter: &MetadataFilter) -> Filter {
    Filter::all(filter.conditions().iter().map(|condition| {
        let key = format!("{METADATA_KEY}.{}", condition.field());
        match condition {
            FieldCondition::Equals { value, .. } => Condition::matches(key, value.clone()),
            FieldCondition::AnyOf { values, .. } => Condition::matches(key, values.clone()),
        }
    }))
}

fn to_candidate(
    id: Option<PointId>,
    payload: HashMap<String, QdrantValue>,
    score: f32,
) -> Candidate {
    let mut payload = payload_to_json(payload);
    let text = match payload.remove(CONTENT_KEY) {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let metadata: BTreeMap<String, Value> = match payload.remove(METADATA_KEY) {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };

    let mut candidate = Candidate::new(point_id_string(id), text, score);
    candidate.metadata = metadata;
    candidate
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

fn value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(inner)) => Value::Object(payload_to_json(inner.fields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{ListValue, Struct};

    fn string_value(s: &str) -> QdrantValue {
        QdrantValue {
            kind: Some(Kind::StringValue(s.to_string())),
        }
    }

    #[test]
    fn test_payload_maps_to_candidate() {
        let mut metadata = HashMap::new();
        metadata.insert("Report_Id".to_string(), string_value("Ventas"));
        metadata.insert(
            "page".to_string(),
            QdrantValue {
                kind: Some(Kind::IntegerValue(3)),
            },
        );
        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), string_value("Total: 1.200"));
        payload.insert(
            METADATA_KEY.to_string(),
            QdrantValue {
                kind: Some(Kind::StructValue(Struct { fields: metadata })),
            },
        );
        let id = PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };

        let candidate = to_candidate(Some(id), payload, 0.8);
        assert_eq!(candidate.id, "42");
        assert_eq!(candidate.text, "Total: 1.200");
        assert_eq!(
            candidate.metadata.get("Report_Id"),
            Some(&Value::String("Ventas".to_string()))
        );
        assert_eq!(candidate.metadata.get("page"), Some(&Value::from(3)));
    }

    #[test]
    fn test_list_payload_converts_to_array() {
        let list = QdrantValue {
            kind: Some(Kind::ListValue(ListValue {
                values: vec![string_value("A"), string_value("B")],
            })),
        };
        assert_eq!(value_to_json(list), serde_json::json!(["A", "B"]));
    }

    #[test]
    fn test_missing_id_and_content() {
        let candidate = to_candidate(None, HashMap::new(), 0.1);
        assert!(candidate.id.is_empty());
        assert!(candidate.text.is_empty());
        assert!(candidate.metadata.is_empty());
    }

    #[test]
    fn test_filter_targets_nested_metadata() {
        let filter = MetadataFilter::new().and(FieldCondition::Equals {
            field: "insertion_year".to_string(),
            value: "2024".to_string(),
        });
        let qdrant_filter = to_qdrant_filter(&filter);
        assert_eq!(qdrant_filter.must.len(), 1);
        let rendered = format!("{qdrant_filter:?}");
        assert!(rendered.contains("metadata.insertion_year"));
    }
}
