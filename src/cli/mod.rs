//! CLI layer for pbi-context.
//!
//! Provides the command-line interface using clap, with commands for
//! retrieving context, dry-running the planner and inspecting the
//! configured profiles and tools.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{Cli, Commands};
