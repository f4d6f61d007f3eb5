//! Tracing subscriber initialization for the binary.
//!
//! Logs always go to stderr: stdout carries command output and, in
//! `mcp stdio` mode, the protocol itself.
//!
//! Filter priority: `PBI_LOG`, then `RUST_LOG`, then the CLI verbosity
//! (`--verbose` → `debug`, otherwise `warn`).

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "PBI_LOG";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Initializes the global subscriber.
///
/// Does nothing if a subscriber is already installed, so tests and
/// embedders can call it freely.
pub fn init(verbose: bool, format: LogFormat) {
    let filter = build_env_filter(verbose);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(format == LogFormat::Text && std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_target(true);

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer.without_time().compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
    };
    drop(result);
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    for var in [LOG_ENV, "RUST_LOG"] {
        if let Ok(directives) = std::env::var(var)
            && let Ok(filter) = EnvFilter::try_new(&directives)
        {
            return filter;
        }
    }
    EnvFilter::new(default_level(verbose).as_str())
}

const fn default_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::WARN }
}
