mod cli;
mod commands;
mod ground_truth;
mod model;
mod recognition;
mod scoring;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

/// Filter used when `RUST_LOG` is unset or unparseable.
const DEFAULT_LOG_FILTER: &str = "docscore=info,warn";

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command.name();

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(command, error = %err, "evaluation command failed");
            for cause in err.chain().skip(1) {
                error!(command, cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Evaluate(args) => commands::evaluate::run(args),
        Commands::Inventory(args) => commands::inventory::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
