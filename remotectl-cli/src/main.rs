//! `remotectl` - command-line interface for controlling remote machines
//!
//! Provides commands for listing configured remotes, checking their state
//! and sensors, running actions, and powering them on or off.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;
use remotectl_core::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if let Err(e) = init_tracing(&cli.tracing_config()) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let result = commands::dispatch(config_path, cli.command).await;

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
