//! pbi-context binary entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use pbi_context::cli::{Cli, execute};
use pbi_context::logging::{self, LogFormat};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init(cli.verbose, format);

    match execute(&cli) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if stdout.write_all(output.as_bytes()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "Error: {e}");
            ExitCode::FAILURE
        }
    }
}
