//! Self-query metadata filtering.
//!
//! A structured query (produced by the language model from the user's
//! question and the list of valid report identifiers) is validated against
//! the [`ReportCatalog`] and turned into one [`MetadataFilter`] per
//! collection, using each collection's own attribute names.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::store::{FieldCondition, MetadataFilter, VectorStore};
use crate::core::{CollectionDescriptor, FieldRole, ReportFilter};
use crate::error::{AgentError, RetrievalError};

static YEAR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{4}$").ok());
static TWO_DIGITS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{2}$").ok());

/// Sorted, de-duplicated list of valid report identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCatalog {
    ids: Vec<String>,
}

impl ReportCatalog {
    /// Builds a catalog; blank identifiers are skipped.
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        Self { ids }
    }

    /// Reads identifiers from a `report_names` payload.
    ///
    /// The payload keeps every identifier in one `page_content` array;
    /// non-string entries are ignored.
    #[must_use]
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let ids = payload
            .get("page_content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self::new(ids)
    }

    /// Identifiers in sorted order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Returns `true` if `id` is a known report.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.binary_search_by(|probe| probe.as_str().cmp(id)).is_ok()
    }

    /// Number of known reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no report is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Comma-joined identifiers, as shown to the model and the agent.
    #[must_use]
    pub fn joined(&self) -> String {
        self.ids.join(",")
    }
}

/// Lazily fetched, process-wide [`ReportCatalog`].
///
/// The first successful fetch is kept; failures are logged and retried on
/// the next request.
pub struct ReportCatalogCache {
    store: Arc<dyn VectorStore>,
    collection: String,
    timeout: Duration,
    cell: OnceCell<ReportCatalog>,
}

impl ReportCatalogCache {
    /// Creates a cache reading the first point of `collection`.
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            timeout,
            cell: OnceCell::new(),
        }
    }

    /// Returns the catalog, fetching it on first use.
    ///
    /// An unreachable store yields an empty catalog for this call only.
    pub async fn get(&self) -> ReportCatalog {
        match self.cell.get_or_try_init(|| self.fetch()).await {
            Ok(catalog) => catalog.clone(),
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "report catalog unavailable");
                ReportCatalog::default()
            }
        }
    }

    async fn fetch(&self) -> Result<ReportCatalog, RetrievalError> {
        let payload = tokio::time::timeout(self.timeout, self.store.first_payload(&self.collection))
            .await
            .map_err(|_| RetrievalError::Timeout {
                collection: self.collection.clone(),
                stage: "report catalog",
                seconds: self.timeout.as_secs(),
            })??;
        let catalog = payload
            .as_ref()
            .map(ReportCatalog::from_payload)
            .unwrap_or_default();
        if catalog.is_empty() {
            return Err(RetrievalError::Store {
                collection: self.collection.clone(),
                message: "no report identifiers found".to_string(),
            });
        }
        debug!(reports = catalog.len(), "report catalog loaded");
        Ok(catalog)
    }
}

impl std::fmt::Debug for ReportCatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportCatalogCache")
            .field("collection", &self.collection)
            .field("loaded", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

/// The model's structured reading of a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredQuery {
    /// Search text with the filter terms removed.
    pub query: String,
    /// Report identifiers the question refers to.
    pub report_ids: Vec<String>,
    /// Insertion year, four digits.
    pub insertion_year: Option<String>,
    /// Insertion month, two digits.
    pub insertion_month: Option<String>,
    /// Insertion day, two digits.
    pub insertion_day: Option<String>,
}

impl StructuredQuery {
    /// Parses the model's JSON answer.
    ///
    /// `report_ids` may be a string or an array of strings. Numbers in date
    /// fields are accepted and zero-padded.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ResponseParse`] if the text is not a JSON object.
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let trimmed = raw.trim();
        let value: Value = serde_json::from_str(trimmed).map_err(|e| AgentError::ResponseParse {
            message: e.to_string(),
            content: trimmed.to_string(),
        })?;
        let Value::Object(map) = value else {
            return Err(AgentError::ResponseParse {
                message: "expected a JSON object".to_string(),
                content: trimmed.to_string(),
            });
        };

        let report_ids = match map.get("report_ids").or_else(|| map.get("report_id")) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            query: map
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            report_ids,
            insertion_year: date_part(map.get("insertion_year"), 4),
            insertion_month: date_part(map.get("insertion_month"), 2),
            insertion_day: date_part(map.get("insertion_day"), 2),
        })
    }
}

fn date_part(value: Option<&Value>, width: usize) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_u64().map(|n| format!("{n:0width$}")),
        _ => None,
    }
}

fn is_match(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    match &**re {
        Some(re) => re.is_match(value),
        None => false,
    }
}

/// Validated filter values for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterPlan {
    /// Report identifiers, all present in the report catalog.
    pub report_ids: Vec<String>,
    /// Insertion year.
    pub insertion_year: Option<String>,
    /// Insertion month.
    pub insertion_month: Option<String>,
    /// Insertion day.
    pub insertion_day: Option<String>,
}

impl FilterPlan {
    /// Combines the selected report, the structured query and the catalog.
    ///
    /// A selected report that the catalog knows takes precedence over the
    /// identifiers the model picked. Identifiers missing from the catalog are
    /// never applied. Malformed dates are dropped.
    #[must_use]
    pub fn resolve(
        selected: &ReportFilter,
        structured: Option<&StructuredQuery>,
        catalog: &ReportCatalog,
    ) -> Self {
        let selected_known = selected.report().filter(|id| catalog.contains(id));

        let report_ids = match (selected_known, structured) {
            (Some(id), _) => vec![id.to_string()],
            (None, Some(sq)) => {
                let mut ids: Vec<String> = sq
                    .report_ids
                    .iter()
                    .map(|id| id.trim())
                    .filter(|id| {
                        let known = catalog.contains(id);
                        if !known && !id.is_empty() {
                            debug!(report_id = id, "dropping unknown report id");
                        }
                        known
                    })
                    .map(str::to_string)
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            }
            (None, None) => Vec::new(),
        };

        if let Some(id) = selected.report()
            && selected_known.is_none()
        {
            warn!(report_id = id, "selected report is not in the report catalog");
        }

        let checked = |value: Option<&String>, re: &LazyLock<Option<Regex>>, max: u32| {
            value
                .filter(|v| is_match(re, v))
                .filter(|v| v.parse::<u32>().is_ok_and(|n| n >= 1 && n <= max))
                .cloned()
        };

        let (year, month, day) = structured.map_or((None, None, None), |sq| {
            (
                checked(sq.insertion_year.as_ref(), &YEAR, 9999),
                checked(sq.insertion_month.as_ref(), &TWO_DIGITS, 12),
                checked(sq.insertion_day.as_ref(), &TWO_DIGITS, 31),
            )
        });

        Self {
            report_ids,
            insertion_year: year,
            insertion_month: month,
            insertion_day: day,
        }
    }

    /// Returns `true` when nothing would be filtered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.report_ids.is_empty()
            && self.insertion_year.is_none()
            && self.insertion_month.is_none()
            && self.insertion_day.is_none()
    }

    /// Builds the predicate for `collection` from the attributes it carries.
    ///
    /// Returns `None` when the collection has none of the constrained
    /// attributes.
    #[must_use]
    pub fn for_collection(&self, collection: &CollectionDescriptor) -> Option<MetadataFilter> {
        let mut filter = MetadataFilter::new();

        if let Some(field) = collection.field_for(FieldRole::ReportId) {
            match self.report_ids.as_slice() {
                [] => {}
                [only] => {
                    filter = filter.and(FieldCondition::Equals {
                        field: field.to_string(),
                        value: only.clone(),
                    });
                }
                many => {
                    filter = filter.and(FieldCondition::AnyOf {
                        field: field.to_string(),
                        values: many.to_vec(),
                    });
                }
            }
        }

        for (role, value) in [
            (FieldRole::InsertionYear, &self.insertion_year),
            (FieldRole::InsertionMonth, &self.insertion_month),
            (FieldRole::InsertionDay, &self.insertion_day),
        ] {
            if let (Some(field), Some(value)) = (collection.field_for(role), value) {
                filter = filter.and(FieldCondition::Equals {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        (!filter.is_empty()).then_some(filter)
    }
}
