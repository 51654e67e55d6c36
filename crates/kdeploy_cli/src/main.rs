//! kdeploy CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Rollout failure
//! - 4: Template error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands};
use config::DeployConfig;
use kdeploy_manifest::ManifestError;
use kdeploy_runner::RunnerError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const ROLLOUT_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "kdeploy=debug"
    } else if cli.quiet {
        "kdeploy=warn"
    } else {
        "kdeploy=info"
    };

    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(level.parse().expect("static directive"))
                .add_directive("warn".parse().expect("static directive")),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = DeployConfig::load(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Render(args) => commands::render::execute(args, config).await,
        Commands::Status(args) => commands::status::execute(args, config).await,
        Commands::Deploy(args) => commands::deploy::execute(args, config).await,
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<ManifestError>() {
            return match err {
                err if err.is_template_error() => ExitCodes::TEMPLATE_ERROR,
                ManifestError::NotFound(_) | ManifestError::InvalidPattern { .. } => {
                    ExitCodes::INVALID_ARGS
                }
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(RunnerError::RolloutFailed(_)) = cause.downcast_ref::<RunnerError>() {
            return ExitCodes::ROLLOUT_FAILURE;
        }
    }

    if e.to_string().starts_with("No manifests given") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
