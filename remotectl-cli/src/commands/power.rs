//! Turn-on and turn-off commands.

use std::path::Path;

use crate::error::CliError;
use crate::util::load_remote;

/// Turn-on command handler
pub async fn cmd_turn_on(config_path: Option<&Path>, name: &str) -> Result<(), CliError> {
    let remote = load_remote(config_path, name)?;
    remote.update_state(false).await?;

    if remote.state().is_online() {
        println!("{} is already online", remote.name());
    } else {
        remote.turn_on().await?;
        println!("Magic packet sent to {}", remote.name());
    }
    remote.disconnect().await;
    Ok(())
}

/// Turn-off command handler
pub async fn cmd_turn_off(config_path: Option<&Path>, name: &str) -> Result<(), CliError> {
    let remote = load_remote(config_path, name)?;
    if !remote.settings().allow_turn_off {
        return Err(CliError::Config(format!(
            "Turning off {} is not allowed; set allow_turn_off = true",
            remote.name()
        )));
    }

    remote.update_state(true).await?;
    let result = remote.turn_off().await;
    remote.disconnect().await;
    result?;
    println!("Shutdown requested for {}", remote.name());
    Ok(())
}
