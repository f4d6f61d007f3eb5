//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::core::{CollectionPlan, PlanningMode, ProfileName, RetrievalProfile, RetrievalStrategy};
use crate::retrieval::ReportCatalog;
use crate::tools::{ToolDefinition, ToolOutput};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything but `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Serializes `value` as pretty JSON followed by a newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).map_or_else(
            |e| format!("{{\"error\": \"serialization failed: {e}\"}}\n"),
            |s| s + "\n",
        )
    }
}

/// Formats tool fragments.
#[must_use]
pub fn format_tool_output(output: &ToolOutput, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => output.to_text() + "\n",
        OutputFormat::Json => format.to_json(output),
    }
}

/// Formats a collection plan.
#[must_use]
pub fn format_plan(plan: &CollectionPlan, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if plan.is_empty() {
                return "Empty plan: no usable collections.\n".to_string();
            }
            let width = plan
                .entries()
                .iter()
                .map(|e| e.collection.len())
                .max()
                .unwrap_or(0);
            let mut out = String::new();
            for entry in plan.entries() {
                let _ = writeln!(out, "{:<width$}  {}", entry.collection, entry.depth);
            }
            out
        }
        OutputFormat::Json => format.to_json(plan),
    }
}

/// Formats the report catalog.
#[must_use]
pub fn format_reports(reports: &ReportCatalog, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if reports.is_empty() {
                return "No reports found.\n".to_string();
            }
            let mut out = String::new();
            for id in reports.ids() {
                let _ = writeln!(out, "{id}");
            }
            out
        }
        OutputFormat::Json => format.to_json(reports.ids()),
    }
}

#[derive(Serialize)]
struct ProfileView {
    name: &'static str,
    #[serde(flatten)]
    profile: RetrievalProfile,
}

/// Formats the five profiles, fastest first.
#[must_use]
pub fn format_profiles(format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!(
                "{:<15} {:<25} {:>7}  {:<10} {}\n",
                "PROFILE", "RERANKER", "MAX LEN", "STRATEGY", "PLAN"
            );
            for name in ProfileName::ALL {
                let p = name.profile();
                let plan = match &p.planning_mode {
                    PlanningMode::Fixed { plan } => format!("fixed {plan}"),
                    PlanningMode::LlmDriven {
                        depth_override: Some(depth),
                    } => format!("planner, depth {depth}"),
                    PlanningMode::LlmDriven {
                        depth_override: None,
                    } => "planner".to_string(),
                };
                let strategy = match p.strategy {
                    RetrievalStrategy::Plain => "plain",
                    RetrievalStrategy::SelfQuery => "self-query",
                };
                let _ = writeln!(
                    out,
                    "{:<15} {:<25} {:>7}  {:<10} {}",
                    name.as_str(),
                    p.reranker_model.id(),
                    p.max_passage_length,
                    strategy,
                    plan
                );
            }
            out
        }
        OutputFormat::Json => {
            let views: Vec<ProfileView> = ProfileName::ALL
                .iter()
                .map(|n| ProfileView {
                    name: n.as_str(),
                    profile: n.profile(),
                })
                .collect();
            format.to_json(&views)
        }
    }
}

/// Formats tool definitions.
#[must_use]
pub fn format_tools(tools: &[ToolDefinition], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for tool in tools {
                let params = serde_json::to_string_pretty(&tool.parameters).unwrap_or_default();
                let _ = writeln!(out, "{}\n  {}\n{params}\n", tool.name, tool.description);
            }
            out
        }
        OutputFormat::Json => format.to_json(tools),
    }
}
