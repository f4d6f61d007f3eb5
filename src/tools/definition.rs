//! Tool definitions, calls and results.
//!
//! Provider-agnostic shapes for exposing the Context and Origin tools to a
//! function-calling agent.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::ProfileName;

/// Name of the Context tool.
pub const CONTEXT_TOOL: &str = "Context";
/// Name of the Origin tool.
pub const ORIGIN_TOOL: &str = "Origin";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match dispatch table in executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result text; failures are prose in the same channel.
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// Both tool definitions, Context first.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![def_context(), def_origin()]
}

fn def_context() -> ToolDefinition {
    let profiles: Vec<&str> = ProfileName::ALL.iter().map(ProfileName::as_str).collect();
    ToolDefinition {
        name: CONTEXT_TOOL.to_string(),
        description: "Anytime further information is needed, or you don't have specific \
                      information from previous conversations, this tool provides it to \
                      answer the user's query."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The user's question."
                },
                "report_filter": {
                    "type": "string",
                    "description": "Restrict results to this report. Omit or pass \
                                    'All reports' for no restriction."
                },
                "profile": {
                    "type": "string",
                    "enum": profiles,
                    "description": "Speed/accuracy profile. Defaults to 'optimized'.",
                    "default": ProfileName::default().as_str()
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_origin() -> ToolDefinition {
    ToolDefinition {
        name: ORIGIN_TOOL.to_string(),
        description: "Use this tool if the user requests the location or origin (page number, \
                      report title, dashboard title, etc.) of data such as KPI values, tables, \
                      charts, visual elements, or insights produced by the assistant."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The element or value whose origin is requested."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_names_and_order() {
        let defs = definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, [CONTEXT_TOOL, ORIGIN_TOOL]);
    }

    #[test]
    fn test_context_schema_lists_profiles() {
        let defs = definitions();
        let profiles = &defs[0].parameters["properties"]["profile"]["enum"];
        assert_eq!(profiles.as_array().map(Vec::len), Some(5));
        assert_eq!(defs[0].parameters["required"], json!(["query"]));
    }

    #[test]
    fn test_schemas_are_objects() {
        for def in definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }
}
