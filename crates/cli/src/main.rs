//! # drainrun
//!
//! Command-line entry point.
//!
//! Provides:
//! - Config file and flag merging
//! - Output and error handler setup
//! - Supervised run whose exit status becomes ours

mod cli;
mod error;
mod run;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::info;

use cli::Cli;
use observability::{level_for_verbosity, ObservabilityConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        default_log_level: level_for_verbosity(cli.verbose, cli.quiet).to_string(),
    })?;

    let config = run::build_config(&cli)?;

    if config.outputs.is_empty() {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "no outputs specified",
            )
            .exit();
    }

    if cli.dry_run {
        let rendered = config_loader::ConfigLoader::to_toml(&config)
            .context("Failed to render configuration")?;
        print!("{rendered}");
        return Ok(ExitCode::SUCCESS);
    }

    info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "drainrun starting");

    let status = run::run_command(cli.command, &config).await?;

    Ok(exit_code(status))
}

/// Statuses outside 0..=255 map to 1
fn exit_code(status: i32) -> ExitCode {
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}
