//! MCP tool parameter types.
//!
//! `schemars` derives the input schemas the MCP protocol requires.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `context` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextParams {
    /// The user's question.
    pub query: String,

    /// Restrict results to this report. Omit, or pass `"All reports"`,
    /// for no restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_filter: Option<String>,

    /// Profile: `"max-speed"`, `"efficient"`, `"optimized"` (default),
    /// `"high-precision"` or `"max-accuracy"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Parameters for the `origin` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OriginParams {
    /// The element or value whose origin is requested.
    pub query: String,
}
