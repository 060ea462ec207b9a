//! typegraph CLI - inspect type-dependency graphs of Go workspaces.
//!
//! Logging goes to stderr and is enabled with `RUST_LOG` (EnvFilter syntax).

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use typegraph::cli::{run, Cli};

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
