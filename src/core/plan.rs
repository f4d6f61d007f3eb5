//! Collection plans: which collections to query and how deep.
//!
//! Plans come either from a profile's fixed configuration or from the
//! planner model's JSON output. [`CollectionPlan::parse`] validates the
//! model output against the catalog and never panics on bad input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::catalog::CollectionCatalog;
use crate::error::PlanParseError;

/// One `(collection, depth)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Planner-facing collection name.
    #[serde(rename = "name")]
    pub collection: String,
    /// Number of results to keep after reranking.
    #[serde(rename = "n")]
    pub depth: usize,
}

impl PlanEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(collection: impl Into<String>, depth: usize) -> Self {
        Self {
            collection: collection.into(),
            depth,
        }
    }
}

/// Ordered list of plan entries with unique collection names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPlan {
    collections: Vec<PlanEntry>,
}

impl CollectionPlan {
    /// Creates a plan, keeping the first entry for any repeated collection.
    #[must_use]
    pub fn new(entries: Vec<PlanEntry>) -> Self {
        let mut collections: Vec<PlanEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !collections.iter().any(|e| e.collection == entry.collection) {
                collections.push(entry);
            }
        }
        Self { collections }
    }

    /// The empty plan.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            collections: Vec::new(),
        }
    }

    /// A plan with a single entry.
    #[must_use]
    pub fn single(collection: impl Into<String>, depth: usize) -> Self {
        Self {
            collections: vec![PlanEntry::new(collection, depth)],
        }
    }

    /// Entries in plan order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.collections
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns `true` if no collection is planned.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Name of the first planned collection.
    #[must_use]
    pub fn first_collection(&self) -> Option<&str> {
        self.collections.first().map(|e| e.collection.as_str())
    }

    /// Depth planned for `collection`, if present.
    #[must_use]
    pub fn depth_of(&self, collection: &str) -> Option<usize> {
        self.collections
            .iter()
            .find(|e| e.collection == collection)
            .map(|e| e.depth)
    }

    /// Sum of all planned depths; an upper bound on the fused result size.
    #[must_use]
    pub fn total_depth(&self) -> usize {
        self.collections.iter().map(|e| e.depth).sum()
    }

    /// Replaces every entry's depth with `depth`.
    #[must_use]
    pub fn with_uniform_depth(mut self, depth: usize) -> Self {
        for entry in &mut self.collections {
            entry.depth = depth;
        }
        self
    }

    /// Parses planner output of the shape `{"collections":[{"name":..,"n":..}]}`.
    ///
    /// The text is trimmed and parsed as strict JSON. A missing `collections`
    /// key yields an empty plan. Entries that are malformed, name a
    /// collection outside `catalog`, or repeat an earlier collection are
    /// dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PlanParseError`] when the text is not JSON, is not an
    /// object, or carries a non-array `collections` value.
    pub fn parse(raw: &str, catalog: &CollectionCatalog) -> Result<Self, PlanParseError> {
        let value: Value =
            serde_json::from_str(raw.trim()).map_err(|e| PlanParseError::InvalidJson {
                message: e.to_string(),
            })?;

        let object = value.as_object().ok_or(PlanParseError::NotAnObject)?;

        let Some(collections) = object.get("collections") else {
            return Ok(Self::empty());
        };
        let items = collections
            .as_array()
            .ok_or(PlanParseError::CollectionsNotArray)?;

        let mut entries: Vec<PlanEntry> = Vec::with_capacity(items.len());
        for item in items {
            let Some(entry) = parse_entry(item) else {
                warn!(entry = %item, "dropping malformed plan entry");
                continue;
            };
            if !catalog.contains(&entry.collection) {
                warn!(collection = %entry.collection, "dropping unknown collection from plan");
                continue;
            }
            if entries.iter().any(|e| e.collection == entry.collection) {
                warn!(collection = %entry.collection, "dropping repeated collection from plan");
                continue;
            }
            entries.push(entry);
        }

        Ok(Self {
            collections: entries,
        })
    }
}

fn parse_entry(item: &Value) -> Option<PlanEntry> {
    let name = item.get("name")?.as_str()?;
    let depth = item.get("n")?.as_u64()?;
    Some(PlanEntry::new(name, usize::try_from(depth).ok()?))
}

impl std::fmt::Display for CollectionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .collections
            .iter()
            .map(|e| format!("{}:{}", e.collection, e.depth))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
