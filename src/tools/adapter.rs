//! The Context and Origin capabilities.
//!
//! Each call maps a query to an ordered list of text fragments. The last
//! fragments are always fixed instructions for the calling agent, never
//! retrieved content. When nothing is retrieved, the whole output is the
//! single [`INVALID_COLLECTIONS`] sentinel.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::core::catalog::REPORT_NAMES;
use crate::core::{ProfileName, QueryContext, ReportFilter, RetrievalProfile};
use crate::error::ConfigError;
use crate::orchestrator::{Orchestrator, RetrievalOutcome};

/// Trailing instruction on every successful result.
pub const LANGUAGE_INSTRUCTION: &str = "Must answer in the same language as the user's question.";

/// Trailing instruction on successful Origin results, before the language one.
pub const ORIGIN_INSTRUCTION: &str = "This tool has returned all the information related to \
     the origin of the requested element. Return which report section it belongs to, on which \
     page of that report it is located, and the title it has on that dashboard.";

/// Sole fragment when no collection produced anything.
pub const INVALID_COLLECTIONS: &str = "Error: Invalid collections";

/// Fragments handed back to the calling agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    /// Retrieved fragments followed by the fixed instructions.
    pub fragments: Vec<String>,
}

impl ToolOutput {
    /// The empty-result sentinel.
    #[must_use]
    pub fn invalid_collections() -> Self {
        Self {
            fragments: vec![INVALID_COLLECTIONS.to_string()],
        }
    }

    /// Returns `true` for the empty-result sentinel.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.fragments.len() == 1 && self.fragments[0] == INVALID_COLLECTIONS
    }

    /// Fragments joined by blank lines.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.fragments.join("\n\n")
    }
}

/// The tool surface over an [`Orchestrator`].
///
/// Holds no per-call state; concurrent calls share only the orchestrator's
/// read-only catalog and cached report list.
#[derive(Debug, Clone)]
pub struct ToolAdapter {
    orchestrator: Arc<Orchestrator>,
}

impl ToolAdapter {
    /// Wraps an orchestrator.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// The wrapped orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Context tool with a profile given by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] for an unrecognised profile,
    /// or any other configuration error from the orchestrator.
    pub async fn invoke(
        &self,
        query: &str,
        report_filter: Option<&str>,
        profile: &str,
    ) -> Result<ToolOutput, ConfigError> {
        let profile: ProfileName = profile.parse()?;
        self.context(query, report_filter, profile).await
    }

    /// Answers `query` from the collections the profile selects.
    ///
    /// When the first planned collection is `report_names`, the list of
    /// valid report identifiers is placed before the retrieved fragments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for configuration defects only.
    pub async fn context(
        &self,
        query: &str,
        report_filter: Option<&str>,
        profile: ProfileName,
    ) -> Result<ToolOutput, ConfigError> {
        let ctx = QueryContext::new(query, ReportFilter::parse(report_filter), profile.profile());
        let outcome = self.orchestrator.retrieve(&ctx).await?;

        let prefix = if outcome.plan.first_collection() == Some(REPORT_NAMES) {
            let reports = self.orchestrator.report_catalog().await;
            (!reports.is_empty()).then(|| reports.joined())
        } else {
            None
        };

        Ok(assemble(prefix, &outcome, &[LANGUAGE_INSTRUCTION]))
    }

    /// Locates where an element or value comes from.
    ///
    /// Always searches the detailed elements collection at depth 3 with the
    /// Origin profile; no planner call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for configuration defects only.
    pub async fn origin(&self, query: &str) -> Result<ToolOutput, ConfigError> {
        let ctx = QueryContext::new(query, ReportFilter::All, RetrievalProfile::origin());
        let outcome = self.orchestrator.retrieve(&ctx).await?;
        Ok(assemble(
            None,
            &outcome,
            &[ORIGIN_INSTRUCTION, LANGUAGE_INSTRUCTION],
        ))
    }
}

fn assemble(prefix: Option<String>, outcome: &RetrievalOutcome, trailer: &[&str]) -> ToolOutput {
    if outcome.is_empty() {
        debug!(plan = %outcome.plan, failed = ?outcome.failed, "no fused candidates");
        return ToolOutput::invalid_collections();
    }

    let mut fragments = Vec::with_capacity(outcome.fused.len() + trailer.len() + 1);
    fragments.extend(prefix);
    fragments.extend(outcome.fused.iter().map(|f| f.render()));
    fragments.extend(trailer.iter().map(|s| (*s).to_string()));
    ToolOutput { fragments }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{Candidate, CollectionPlan, FusedCandidate};

    fn outcome(texts: &[&str]) -> RetrievalOutcome {
        RetrievalOutcome {
            plan: CollectionPlan::single("Elements", 3),
            fused: texts
                .iter()
                .enumerate()
                .map(|(i, t)| FusedCandidate {
                    candidate: Candidate::new(i.to_string(), *t, 1.0),
                    collection: "Elements".to_string(),
                    weight: 0.3,
                    collection_rank: i,
                    fused_score: 0.3,
                })
                .collect(),
            failed: Vec::new(),
            filters: None,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_assemble_appends_trailer() {
        let out = assemble(None, &outcome(&["a", "b"]), &[LANGUAGE_INSTRUCTION]);
        assert_eq!(out.fragments.len(), 3);
        assert!(out.fragments[0].starts_with("a\nmetadata:"));
        assert_eq!(out.fragments[2], LANGUAGE_INSTRUCTION);
    }

    #[test]
    fn test_assemble_prefix_first() {
        let out = assemble(
            Some("Finanzas,Ventas".to_string()),
            &outcome(&["a"]),
            &[ORIGIN_INSTRUCTION, LANGUAGE_INSTRUCTION],
        );
        assert_eq!(out.fragments[0], "Finanzas,Ventas");
        assert_eq!(out.fragments.last().map(String::as_str), Some(LANGUAGE_INSTRUCTION));
        assert_eq!(out.fragments[2], ORIGIN_INSTRUCTION);
    }

    #[test]
    fn test_empty_outcome_is_sentinel_even_with_prefix() {
        let out = assemble(Some("Ventas".to_string()), &outcome(&[]), &[LANGUAGE_INSTRUCTION]);
        assert!(out.is_invalid());
        assert_eq!(out.fragments, [INVALID_COLLECTIONS]);
    }

    #[test]
    fn test_to_text_joins_with_blank_lines() {
        let out = ToolOutput {
            fragments: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(out.to_text(), "a\n\nb");
    }
}
