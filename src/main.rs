// ABOUTME: Entry point for the fleetdown CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::SimulateOptions;
use fleetdown::config::{self, Config};
use fleetdown::error::Result;
use fleetdown::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    match run(cli, mode).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Returns whether the command reached its goal.
async fn run(cli: Cli, mode: OutputMode) -> Result<bool> {
    let output = Output::new(mode);
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { force } => {
            let path = config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(true)
        }
        Commands::Classify(args) => {
            let config = Config::discover_or_default(&cwd)?;
            commands::classify_fleet(&config, &args.fleet, args.mode.into(), &output)?;
            Ok(true)
        }
        Commands::Simulate {
            fleet,
            yes,
            user,
            allow_os_shutdown,
        } => {
            let config = Config::discover_or_default(&cwd)?;
            let options = SimulateOptions {
                mode: fleet.mode.into(),
                assume_yes: yes,
                user: user.map(Into::into),
                allow_os_shutdown,
            };
            commands::simulate(config, &fleet.fleet, options, output).await
        }
    }
}
