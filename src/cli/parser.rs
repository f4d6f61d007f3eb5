//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pbi-context: multi-collection retrieval for Power BI report assistants.
///
/// Plans which collections to search, retrieves and reranks each one, and
/// fuses the results into the fragments an answering agent reads.
#[derive(Parser, Debug)]
#[command(name = "pbi-context")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve context fragments for a question (the Context tool).
    #[command(after_help = r#"Examples:
  pbi-context context "What reports are available?"
  pbi-context context "Margen bruto por región" --report Ventas
  pbi-context context "Top KPIs" --profile max-speed
  pbi-context --format json context "Revenue trend" | jq '.fragments[]'
"#)]
    Context {
        /// The user's question.
        query: String,

        /// Restrict results to this report ("All reports" for none).
        #[arg(short, long)]
        report: Option<String>,

        /// Profile: max-speed, efficient, optimized, high-precision, max-accuracy.
        #[arg(short, long, default_value = "optimized", env = "PBI_PROFILE")]
        profile: String,
    },

    /// Locate where an element or value comes from (the Origin tool).
    #[command(after_help = r#"Examples:
  pbi-context origin "Revenue KPI 1.2M"
"#)]
    Origin {
        /// The element or value whose origin is requested.
        query: String,
    },

    /// Show the collection plan for a question without retrieving.
    #[command(after_help = r#"Examples:
  pbi-context plan "When was the last report uploaded?"
  pbi-context plan "Sales by region" --profile max-accuracy
"#)]
    Plan {
        /// The user's question.
        query: String,

        /// Profile: max-speed, efficient, optimized, high-precision, max-accuracy.
        #[arg(short, long, default_value = "optimized", env = "PBI_PROFILE")]
        profile: String,
    },

    /// List the valid report identifiers.
    Reports,

    /// Show the retrieval profiles.
    Profiles,

    /// Print the Context and Origin tool definitions.
    Tools,

    /// Write the default system prompts for editing.
    ///
    /// Existing files are not overwritten.
    #[command(after_help = r#"Examples:
  pbi-context init-prompts                   # ~/.config/pbi-context/prompts
  pbi-context init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),
}

/// MCP server subcommands.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Start MCP server with stdio transport.
    ///
    /// Reads JSON-RPC messages from stdin, writes responses to stdout.
    #[command(after_help = r#"Examples:
  pbi-context mcp stdio
  OPENAI_API_KEY=sk-... pbi-context mcp stdio
"#)]
    Stdio,

    /// Start MCP server with streamable HTTP transport.
    #[command(after_help = r#"Examples:
  pbi-context mcp serve                            # Listen on 127.0.0.1:3000
  pbi-context mcp serve --host 0.0.0.0 --port 8080
"#)]
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}
