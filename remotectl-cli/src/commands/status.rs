//! Status command: one health check, then a sensor report.

use std::fmt::Write as _;
use std::path::Path;

use remotectl_core::remote::StateSnapshot;
use remotectl_core::{Remote, RemoteError, SensorValue};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::load_remote;

/// Status command handler
pub async fn cmd_status(
    config_path: Option<&Path>,
    name: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let remote = load_remote(config_path, name)?;

    match remote.update_state(true).await {
        Ok(()) | Err(RemoteError::Offline(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let report = StatusReport::collect(&remote);
    remote.disconnect().await;

    match format {
        OutputFormat::Table => println!("{}", report.format_table()),
        OutputFormat::Json => println!("{}", report.format_json()?),
    }
    Ok(())
}

/// One sensor line of a report
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SensorRow {
    pub key: String,
    pub name: String,
    pub value: Option<SensorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SensorRow {
    /// Value with its unit, or `-` when unknown
    pub fn display_value(&self) -> String {
        match (&self.value, &self.unit) {
            (Some(value), Some(unit)) => format!("{value} {unit}"),
            (Some(value), None) => value.to_string(),
            (None, _) => "-".to_string(),
        }
    }
}

/// State and sensor values of a remote at one point in time
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusReport {
    pub name: String,
    pub host: String,
    pub state: StateSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub sensors: Vec<SensorRow>,
}

impl StatusReport {
    /// Snapshots `remote`, with sensors sorted by key
    pub fn collect(remote: &Remote) -> Self {
        let mut sensors: Vec<SensorRow> = remote
            .manager()
            .sensors_by_key()
            .into_values()
            .map(|sensor| SensorRow {
                key: sensor.key().to_string(),
                name: sensor.name().to_string(),
                value: sensor.value(),
                unit: sensor.unit().map(str::to_string),
            })
            .collect();
        sensors.sort_by(|a, b| a.key.cmp(&b.key));

        Self {
            name: remote.name().to_string(),
            host: remote.host().to_string(),
            state: remote.state().snapshot(),
            mac: remote.mac_address().map(|mac| mac.to_string()),
            sensors,
        }
    }

    /// Human-readable report
    #[must_use]
    pub fn format_table(&self) -> String {
        let mut output = String::new();
        let state = match (self.state.is_online, self.state.is_connected) {
            (_, true) => "connected",
            (true, false) => "online",
            (false, false) => "offline",
        };
        let _ = writeln!(output, "{} ({}): {state}", self.name, self.host);

        if !self.state.is_connected {
            return output.trim_end().to_string();
        }

        let key_width = self
            .sensors
            .iter()
            .map(|s| s.key.len())
            .max()
            .unwrap_or(6)
            .max(6);
        let _ = writeln!(output);
        let _ = writeln!(output, "{:<key_width$}  VALUE", "SENSOR");
        let _ = writeln!(output, "{:-<key_width$}  {:-<5}", "", "");
        for sensor in &self.sensors {
            let _ = writeln!(
                output,
                "{:<key_width$}  {}",
                sensor.key,
                sensor.display_value()
            );
        }

        output.trim_end().to_string()
    }

    /// Machine-readable report
    ///
    /// # Errors
    ///
    /// Returns `CliError::Output` if JSON serialization fails.
    pub fn format_json(&self) -> Result<String, CliError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CliError::Output(format!("Failed to serialize to JSON: {e}")))
    }
}
