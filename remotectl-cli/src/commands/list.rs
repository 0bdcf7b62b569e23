//! List remotes command.

use std::fmt::Write as _;
use std::path::Path;

use remotectl_core::RemoteConfig;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::create_config_manager;

/// List remotes command handler
pub fn cmd_list(config_path: Option<&Path>, format: OutputFormat) -> Result<(), CliError> {
    let remotes = create_config_manager(config_path)?.load()?.remotes;

    match format {
        OutputFormat::Table => println!("{}", format_table(&remotes)),
        OutputFormat::Json => println!("{}", format_json(&remotes)?),
    }

    Ok(())
}

/// Format remotes as a table string
#[must_use]
pub fn format_table(remotes: &[RemoteConfig]) -> String {
    if remotes.is_empty() {
        return "No remotes configured.".to_string();
    }

    let mut output = String::new();

    let name_width = remotes
        .iter()
        .map(|r| r.display_name().len())
        .max()
        .unwrap_or(4)
        .max(4);
    let host_width = remotes
        .iter()
        .map(|r| r.host.len())
        .max()
        .unwrap_or(4)
        .max(4);
    let port_width = 5;
    let collection_width = 18;

    let _ = writeln!(
        output,
        "{:<name_width$}  {:<host_width$}  \
         {:<port_width$}  {:<collection_width$}  MAC",
        "NAME", "HOST", "PORT", "COLLECTION"
    );
    let _ = writeln!(
        output,
        "{:-<name_width$}  {:-<host_width$}  \
         {:-<port_width$}  {:-<collection_width$}  {:-<17}",
        "", "", "", "", ""
    );

    for remote in remotes {
        let mac = remote
            .mac
            .map_or_else(|| "-".to_string(), |mac| mac.to_string());
        let _ = writeln!(
            output,
            "{:<name_width$}  {:<host_width$}  \
             {:<port_width$}  {:<collection_width$}  {mac}",
            remote.display_name(),
            remote.host,
            remote.port,
            remote.collection
        );
    }

    output.trim_end().to_string()
}

/// Format remotes as JSON string
///
/// # Errors
///
/// Returns `CliError::Output` if JSON serialization fails.
pub fn format_json(remotes: &[RemoteConfig]) -> Result<String, CliError> {
    let output: Vec<RemoteOutput> = remotes.iter().map(RemoteOutput::from).collect();
    serde_json::to_string_pretty(&output)
        .map_err(|e| CliError::Output(format!("Failed to serialize to JSON: {e}")))
}

/// Remote entry without credentials
#[derive(Debug, Clone, serde::Serialize)]
pub struct RemoteOutput {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub allow_turn_off: bool,
}

impl From<&RemoteConfig> for RemoteOutput {
    fn from(remote: &RemoteConfig) -> Self {
        Self {
            name: remote.display_name().to_string(),
            host: remote.host.clone(),
            port: remote.port,
            username: remote.username.clone(),
            collection: remote.collection.clone(),
            mac: remote.mac.map(|mac| mac.to_string()),
            allow_turn_off: remote.allow_turn_off,
        }
    }
}
