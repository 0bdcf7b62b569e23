//! Run an action command on a remote.

use std::path::Path;

use remotectl_core::CommandContext;

use crate::error::CliError;
use crate::util::load_remote;

/// Run command handler
pub async fn cmd_run(
    config_path: Option<&Path>,
    name: &str,
    action: &str,
    fields: Vec<(String, String)>,
) -> Result<(), CliError> {
    let remote = load_remote(config_path, name)?;
    remote.update_state(true).await?;

    let context: CommandContext = fields.into_iter().collect();
    let result = remote.run_action(action, context).await;
    remote.disconnect().await;
    let output = result?;

    for line in &output.stdout {
        println!("{line}");
    }
    for line in &output.stderr {
        eprintln!("{line}");
    }
    if output.exit_code != 0 {
        return Err(CliError::Command(format!(
            "'{action}' exited with status {}",
            output.exit_code
        )));
    }
    Ok(())
}
