//! Shared utility functions used across command modules.

use std::path::Path;

use remotectl_core::config::ConfigManager;
use remotectl_core::{Remote, RemoteConfig};

use crate::error::CliError;

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<ConfigManager, CliError> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_config_dir(path.to_path_buf())),
        None => ConfigManager::new()
            .map_err(|e| CliError::Config(format!("Failed to initialize config: {e}"))),
    }
}

/// Parse a key=value pair for template fields
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Loads the remotes file and finds a remote by name or host
pub fn find_remote_config(
    config_path: Option<&Path>,
    name_or_host: &str,
) -> Result<RemoteConfig, CliError> {
    let config_manager = create_config_manager(config_path)?;
    tracing::debug!(path = %config_manager.remotes_path().display(), "Loading remotes");
    config_manager
        .load()?
        .find(name_or_host)
        .cloned()
        .ok_or_else(|| CliError::RemoteNotFound(name_or_host.to_string()))
}

/// Builds a ready-to-use remote from its configuration entry
pub fn load_remote(config_path: Option<&Path>, name_or_host: &str) -> Result<Remote, CliError> {
    Ok(find_remote_config(config_path, name_or_host)?.build()?)
}
