//! Command handler modules for the CLI.

mod list;
mod power;
mod run;
mod status;
mod watch;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub async fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::List { format } => list::cmd_list(config_path, format),
        Commands::Status { name, format } => status::cmd_status(config_path, &name, format).await,
        Commands::Run {
            name,
            action,
            fields,
        } => run::cmd_run(config_path, &name, &action, fields).await,
        Commands::TurnOn { name } => power::cmd_turn_on(config_path, &name).await,
        Commands::TurnOff { name } => power::cmd_turn_off(config_path, &name).await,
        Commands::Watch {
            name,
            interval,
            count,
        } => watch::cmd_watch(config_path, &name, interval, count).await,
    }
}
