//! Tool executor that dispatches tool calls to the [`ToolAdapter`].
//!
//! Every outcome, including unknown tools, malformed arguments and
//! configuration errors, comes back as a [`ToolResult`] whose content is
//! prose the calling agent can read.

use serde::Deserialize;
use tracing::warn;

use super::adapter::{ToolAdapter, ToolOutput};
use super::definition::{CONTEXT_TOOL, ORIGIN_TOOL, ToolCall, ToolResult};
use crate::core::ProfileName;
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Executes tool calls by name.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    adapter: ToolAdapter,
}

impl ToolExecutor {
    /// Creates an executor over `adapter`.
    #[must_use]
    pub const fn new(adapter: ToolAdapter) -> Self {
        Self { adapter }
    }

    /// Dispatches a tool call.
    ///
    /// Validates raw argument size before dispatch.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
            };
        }

        let result = match call.name.as_str() {
            CONTEXT_TOOL => self.tool_context(&call.arguments).await,
            ORIGIN_TOOL => self.tool_origin(&call.arguments).await,
            other => Err(AgentError::ToolExecution {
                name: other.to_string(),
                message: "unknown tool".to_string(),
            }),
        };

        match result {
            Ok(output) => ToolResult {
                tool_call_id: call.id.clone(),
                content: output.to_text(),
                is_error: false,
            },
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: e.to_string(),
                    is_error: true,
                }
            }
        }
    }

    async fn tool_context(&self, args: &str) -> Result<ToolOutput, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            report_filter: Option<String>,
            profile: Option<String>,
        }
        let args: Args = parse_args(CONTEXT_TOOL, args)?;
        let profile = match args.profile.as_deref() {
            Some(name) => name
                .parse::<ProfileName>()
                .map_err(|e| tool_error(CONTEXT_TOOL, &e))?,
            None => ProfileName::default(),
        };

        self.adapter
            .context(&args.query, args.report_filter.as_deref(), profile)
            .await
            .map_err(|e| tool_error(CONTEXT_TOOL, &e))
    }

    async fn tool_origin(&self, args: &str) -> Result<ToolOutput, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            query: String,
        }
        let args: Args = parse_args(ORIGIN_TOOL, args)?;

        self.adapter
            .origin(&args.query)
            .await
            .map_err(|e| tool_error(ORIGIN_TOOL, &e))
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(name: &str, args: &str) -> Result<T, AgentError> {
    serde_json::from_str(args).map_err(|e| AgentError::ToolExecution {
        name: name.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

fn tool_error(name: &str, e: &impl std::fmt::Display) -> AgentError {
    AgentError::ToolExecution {
        name: name.to_string(),
        message: e.to_string(),
    }
}
