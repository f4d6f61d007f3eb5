//! Collection catalog: the static description of every searchable collection.
//!
//! The catalog is built once at startup and shared read-only across
//! requests. Planner prompts, plan validation, retriever registration and
//! metadata predicate construction all read from it.

use std::fmt::Write;

use serde::Serialize;

/// Planner-facing name of the report-names collection.
pub const REPORT_NAMES: &str = "report_names";
/// Planner-facing name of the element-index collection.
pub const ELEMENT_NAMES: &str = "element_names";
/// Planner-facing name of the upload-dates collection.
pub const UPLOAD_DATES: &str = "upload_dates";
/// Planner-facing name of the report-summaries collection.
pub const REPORT_SUMMARIES: &str = "Report Summaries";
/// Planner-facing name of the detailed-elements collection.
pub const ELEMENTS: &str = "Elements";
/// Planner-facing name of the page-text collection.
pub const TEXT_PAGES: &str = "Text Pages";

/// What kind of content a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    /// Names of available reports only.
    ReportNames,
    /// Index of elements per report, without values.
    ElementIndex,
    /// Report upload/update dates.
    Dates,
    /// Concise per-report summaries.
    Summary,
    /// Detailed element content (charts, tables, KPIs).
    Detail,
    /// Full page text.
    PageText,
}

impl ContentKind {
    /// Returns the kebab-case identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReportNames => "report-names",
            Self::ElementIndex => "element-index",
            Self::Dates => "dates",
            Self::Summary => "summary",
            Self::Detail => "detail",
            Self::PageText => "page-text",
        }
    }
}

/// Value type of a filterable metadata attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// String equality.
    String,
}

/// Semantic role of a metadata attribute, independent of its stored name.
///
/// Collections name the report identifier differently (`report_id`,
/// `Report_Id`, `Id`); the role lets predicate construction treat them alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Report identifier.
    ReportId,
    /// Four-digit insertion year.
    InsertionYear,
    /// Two-digit insertion month.
    InsertionMonth,
    /// Two-digit insertion day.
    InsertionDay,
}

/// A filterable metadata attribute of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataField {
    /// Attribute name as stored in the payload.
    pub name: String,
    /// Value type.
    pub field_type: FieldType,
    /// Semantic role.
    pub role: FieldRole,
}

impl MetadataField {
    fn string(name: &str, role: FieldRole) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::String,
            role,
        }
    }

    fn insertion_dates() -> [Self; 3] {
        [
            Self::string("insertion_year", FieldRole::InsertionYear),
            Self::string("insertion_month", FieldRole::InsertionMonth),
            Self::string("insertion_day", FieldRole::InsertionDay),
        ]
    }
}

/// Static description of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDescriptor {
    /// Unique planner-facing name.
    pub name: String,
    /// Name of the collection in the vector store.
    pub store_name: String,
    /// Content semantics.
    pub content_kind: ContentKind,
    /// One-line description shown to the planner.
    pub description: String,
    /// Filterable attributes.
    pub metadata_fields: Vec<MetadataField>,
    /// Depth suggested to the planner when it has no better estimate.
    pub default_depth: usize,
    /// Candidates fetched by the self-query strategy before reranking.
    pub search_breadth: usize,
}

impl CollectionDescriptor {
    /// Returns the stored name of the attribute playing `role`, if any.
    #[must_use]
    pub fn field_for(&self, role: FieldRole) -> Option<&str> {
        self.metadata_fields
            .iter()
            .find(|f| f.role == role)
            .map(|f| f.name.as_str())
    }

    /// Returns `true` when the collection has any filterable attribute.
    #[must_use]
    pub fn is_filterable(&self) -> bool {
        !self.metadata_fields.is_empty()
    }
}

/// The set of collections available to the planner.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionCatalog {
    collections: Vec<CollectionDescriptor>,
}

impl CollectionCatalog {
    /// Creates a catalog from descriptors.
    ///
    /// Later descriptors with a name already present are ignored.
    #[must_use]
    pub fn new(descriptors: Vec<CollectionDescriptor>) -> Self {
        let mut collections: Vec<CollectionDescriptor> = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if !collections.iter().any(|c| c.name == d.name) {
                collections.push(d);
            }
        }
        Self { collections }
    }

    /// The six Power BI report collections.
    #[must_use]
    pub fn power_bi() -> Self {
        Self::new(vec![
            CollectionDescriptor {
                name: REPORT_NAMES.to_string(),
                store_name: "report_names".to_string(),
                content_kind: ContentKind::ReportNames,
                description: "Contains only names of available reports, ideal for queries that \
                              only require report titles."
                    .to_string(),
                metadata_fields: Vec::new(),
                default_depth: 20,
                search_breadth: 20,
            },
            CollectionDescriptor {
                name: ELEMENT_NAMES.to_string(),
                store_name: "element_names".to_string(),
                content_kind: ContentKind::ElementIndex,
                description: "Stores only an index of elements in each report, allowing for quick \
                              retrieval of report schemas or confirmation of element existence \
                              without any data, value, or content."
                    .to_string(),
                metadata_fields: vec![MetadataField::string("report_id", FieldRole::ReportId)],
                default_depth: 2,
                search_breadth: 2,
            },
            CollectionDescriptor {
                name: UPLOAD_DATES.to_string(),
                store_name: "upload_dates".to_string(),
                content_kind: ContentKind::Dates,
                description: "Contains all dates when the reports were updated, suitable for \
                              queries that inquire about the report's upload or update history."
                    .to_string(),
                metadata_fields: vec![MetadataField::string("report_id", FieldRole::ReportId)],
                default_depth: 20,
                search_breadth: 2,
            },
            CollectionDescriptor {
                name: REPORT_SUMMARIES.to_string(),
                store_name: "report_sum".to_string(),
                content_kind: ContentKind::Summary,
                description: "Contains concise overviews of individual reports, organized by \
                              date, suitable for queries seeking general summaries of specific \
                              reports."
                    .to_string(),
                metadata_fields: with_dates(MetadataField::string(
                    "Report_Id",
                    FieldRole::ReportId,
                )),
                default_depth: 2,
                search_breadth: 2,
            },
            CollectionDescriptor {
                name: ELEMENTS.to_string(),
                store_name: "table_elements".to_string(),
                content_kind: ContentKind::Detail,
                description: "Provides detailed data on individual report components (charts, \
                              tables, KPIs), ideal for queries that target specific details \
                              within reports such as values or specific data."
                    .to_string(),
                metadata_fields: with_dates(MetadataField::string("Id", FieldRole::ReportId)),
                default_depth: 3,
                search_breadth: 20,
            },
            CollectionDescriptor {
                name: TEXT_PAGES.to_string(),
                store_name: "text_pages".to_string(),
                content_kind: ContentKind::PageText,
                description: "Contains complete text data from each report's pages, organized by \
                              date, and provides in-depth information for queries focused on \
                              specific sections or pages within dashboards."
                    .to_string(),
                metadata_fields: with_dates(MetadataField::string(
                    "Report_Id",
                    FieldRole::ReportId,
                )),
                default_depth: 2,
                search_breadth: 8,
            },
        ])
    }

    /// Looks up a collection by planner-facing name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionDescriptor> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Returns `true` if the catalog describes `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates descriptors in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.collections.iter()
    }

    /// Number of collections.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Renders the bullet list of collections for the planner prompt.
    #[must_use]
    pub fn planner_listing(&self) -> String {
        let mut out = String::new();
        for c in &self.collections {
            let _ = writeln!(out, "- **{}**: {}", c.name, c.description);
        }
        out
    }

    /// Renders the default-depth hint, e.g. `report_names: 20, Elements: 3`.
    #[must_use]
    pub fn default_depths(&self) -> String {
        self.collections
            .iter()
            .map(|c| format!("{}: {}", c.name, c.default_depth))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for CollectionCatalog {
    fn default() -> Self {
        Self::power_bi()
    }
}

fn with_dates(report_field: MetadataField) -> Vec<MetadataField> {
    let mut fields = vec![report_field];
    fields.extend(MetadataField::insertion_dates());
    fields
}
