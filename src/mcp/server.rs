//! MCP server implementation for pbi-context.
//!
//! Exposes the Context and Origin tools. Retrieved fragments come back as
//! one text content item each, in order, instructions last.

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use tracing::debug;

use super::params::{ContextParams, OriginParams};
use crate::core::ProfileName;
use crate::error::ConfigError;
use crate::tools::{ToolAdapter, ToolOutput};

/// pbi-context MCP server.
#[derive(Clone)]
pub struct PbiMcpServer {
    tool_router: ToolRouter<Self>,
    adapter: ToolAdapter,
}

#[tool_router]
impl PbiMcpServer {
    /// Retrieve context fragments for a question about the Power BI reports.
    #[tool(
        name = "context",
        description = "Anytime further information is needed, or you don't have specific information from previous conversations, this tool provides it to answer the user's query. Optionally restrict to one report and choose a speed/accuracy profile."
    )]
    async fn context(
        &self,
        Parameters(params): Parameters<ContextParams>,
    ) -> Result<CallToolResult, McpError> {
        let profile = match params.profile.as_deref() {
            Some(name) => name.parse::<ProfileName>().map_err(to_mcp_error)?,
            None => ProfileName::default(),
        };
        debug!(profile = %profile, report = ?params.report_filter, "mcp context call");

        let output = self
            .adapter
            .context(&params.query, params.report_filter.as_deref(), profile)
            .await
            .map_err(to_mcp_error)?;
        Ok(to_result(output))
    }

    /// Locate where an element or value comes from.
    #[tool(
        name = "origin",
        description = "Use this tool if the user requests the location or origin (page number, report title, dashboard title, etc.) of data such as KPI values, tables, charts, visual elements, or insights produced by the assistant."
    )]
    async fn origin(
        &self,
        Parameters(params): Parameters<OriginParams>,
    ) -> Result<CallToolResult, McpError> {
        let output = self
            .adapter
            .origin(&params.query)
            .await
            .map_err(to_mcp_error)?;
        Ok(to_result(output))
    }
}

#[tool_handler]
impl ServerHandler for PbiMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pbi-context".to_string(),
                title: Some("Power BI Context Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Retrieval over indexed Power BI reports. Use `context` to gather \
                 information for a question and `origin` to find which report, page and \
                 dashboard title a value comes from."
                    .to_string(),
            ),
        }
    }
}

impl PbiMcpServer {
    /// Creates a server over `adapter`.
    #[must_use]
    pub fn new(adapter: ToolAdapter) -> Self {
        Self {
            tool_router: Self::tool_router(),
            adapter,
        }
    }
}

impl std::fmt::Debug for PbiMcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbiMcpServer")
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

fn to_result(output: ToolOutput) -> CallToolResult {
    CallToolResult::success(output.fragments.into_iter().map(Content::text).collect())
}

fn to_mcp_error(e: ConfigError) -> McpError {
    match e {
        ConfigError::UnknownProfile { .. } => McpError::invalid_params(e.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}
