//! CLI command implementations.
//!
//! Commands that touch the vector store or a model build the full service
//! stack and run on a fresh tokio runtime. `profiles`, `tools` and
//! `init-prompts` need neither.

use std::path::Path;
use std::sync::Arc;

use crate::cli::output::{
    OutputFormat, format_plan, format_profiles, format_reports, format_tool_output, format_tools,
};
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{Cli, Commands};
use crate::config::AssistantConfig;
use crate::core::{CollectionCatalog, ProfileName, QueryContext, ReportFilter};
use crate::error::{CommandError, Result};
use crate::orchestrator::Orchestrator;
use crate::retrieval::FusionWeightTable;
use crate::services::Services;
use crate::tools::{ToolAdapter, definitions};

/// Executes the CLI command.
///
/// Returns the text to print on stdout.
///
/// # Errors
///
/// Returns an error if the profile is unknown, configuration is invalid or
/// the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Context {
            query,
            report,
            profile,
        } => {
            let profile: ProfileName = profile.parse()?;
            cmd_context(query, report.as_deref(), profile, format)
        }
        Commands::Origin { query } => cmd_origin(query, format),
        Commands::Plan { query, profile } => {
            let profile: ProfileName = profile.parse()?;
            cmd_plan(query, profile, format)
        }
        Commands::Reports => cmd_reports(format),
        Commands::Profiles => Ok(format_profiles(format)),
        Commands::Tools => Ok(format_tools(&definitions(), format)),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "mcp")]
        Commands::Mcp(cmd) => cmd_mcp(cmd),
    }
}

/// Builds the orchestrator from environment configuration.
///
/// # Errors
///
/// Returns a configuration error if settings are invalid or the
/// production stack is not compiled in.
pub fn build_orchestrator() -> Result<Orchestrator> {
    let config = AssistantConfig::from_env()?;
    let services = Services::from_config(&config)?;
    Ok(Orchestrator::new(
        services,
        CollectionCatalog::power_bi(),
        FusionWeightTable::power_bi(),
        &config,
    )?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_context(
    query: &str,
    report: Option<&str>,
    profile: ProfileName,
    format: OutputFormat,
) -> Result<String> {
    let adapter = ToolAdapter::new(Arc::new(build_orchestrator()?));
    let output = runtime()?.block_on(adapter.context(query, report, profile))?;
    Ok(format_tool_output(&output, format))
}

fn cmd_origin(query: &str, format: OutputFormat) -> Result<String> {
    let adapter = ToolAdapter::new(Arc::new(build_orchestrator()?));
    let output = runtime()?.block_on(adapter.origin(query))?;
    Ok(format_tool_output(&output, format))
}

fn cmd_plan(query: &str, profile: ProfileName, format: OutputFormat) -> Result<String> {
    let orchestrator = build_orchestrator()?;
    let ctx = QueryContext::new(query, ReportFilter::All, profile.profile());
    let plan = runtime()?.block_on(orchestrator.plan(&ctx))?;
    Ok(format_plan(&plan, format))
}

fn cmd_reports(format: OutputFormat) -> Result<String> {
    let orchestrator = build_orchestrator()?;
    let reports = runtime()?.block_on(orchestrator.report_catalog());
    Ok(format_reports(&reports, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    use crate::agent::prompt::PromptSet;

    let target_dir = dir
        .map(std::path::PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown");
                output.push_str("  ");
                output.push_str(name);
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the planner and filter prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Starts the MCP server with the specified transport.
///
/// Runs until the client disconnects (stdio) or the process is stopped
/// (HTTP).
#[cfg(feature = "mcp")]
fn cmd_mcp(cmd: &McpCommands) -> Result<String> {
    use crate::mcp::{PbiMcpServer, serve_http, serve_stdio};

    let adapter = ToolAdapter::new(Arc::new(build_orchestrator()?));
    let server = PbiMcpServer::new(adapter);

    runtime()?
        .block_on(async {
            match cmd {
                McpCommands::Stdio => serve_stdio(server).await,
                McpCommands::Serve { host, port } => serve_http(server, host, *port).await,
            }
        })
        .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}
