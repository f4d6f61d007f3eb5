//! Per-request query context.

use serde::Serialize;

use super::profile::RetrievalProfile;

/// Report-filter values meaning "do not restrict to one report".
///
/// The Spanish form is what the report picker sends.
pub const ALL_REPORTS_SENTINELS: [&str; 2] = ["Todos los informes", "All reports"];

/// Optional restriction of a query to one report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFilter {
    /// No restriction.
    #[default]
    All,
    /// Restrict to this report identifier.
    Report(String),
}

impl ReportFilter {
    /// Interprets a raw filter value.
    ///
    /// `None`, blank strings and the "all reports" sentinels (compared
    /// case-insensitively) mean no restriction.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::All,
            Some(value)
                if ALL_REPORTS_SENTINELS
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(value)) =>
            {
                Self::All
            }
            Some(value) => Self::Report(value.to_string()),
        }
    }

    /// The selected report identifier, if any.
    #[must_use]
    pub fn report(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Report(id) => Some(id),
        }
    }
}

/// Immutable inputs of one retrieval request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryContext {
    /// The user's question, verbatim.
    pub raw_query: String,
    /// Optional report restriction.
    pub report_filter: ReportFilter,
    /// Resolved profile.
    pub profile: RetrievalProfile,
}

impl QueryContext {
    /// Creates a context.
    #[must_use]
    pub fn new(
        raw_query: impl Into<String>,
        report_filter: ReportFilter,
        profile: RetrievalProfile,
    ) -> Self {
        Self {
            raw_query: raw_query.into(),
            report_filter,
            profile,
        }
    }

    /// The query with the report filter appended as plain text.
    ///
    /// Used when the report restriction cannot be expressed as a metadata
    /// predicate.
    #[must_use]
    pub fn augmented_query(&self) -> String {
        self.report_filter.report().map_or_else(
            || self.raw_query.clone(),
            |report| format!("{} filter results for the report {report}", self.raw_query),
        )
    }
}
