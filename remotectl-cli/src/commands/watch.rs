//! Watch command: periodic health checks with change output.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::status::StatusReport;
use crate::error::CliError;
use crate::util::load_remote;

/// Watch command handler
pub async fn cmd_watch(
    config_path: Option<&Path>,
    name: &str,
    interval: u64,
    count: Option<u64>,
) -> Result<(), CliError> {
    if interval == 0 {
        return Err(CliError::Config(
            "Watch interval must be at least one second".to_string(),
        ));
    }
    let remote = load_remote(config_path, name)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous: Option<StatusReport> = None;
    let mut ticks = 0_u64;

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }

        if let Err(e) = remote.update_state(false).await {
            break Err(CliError::from(e));
        }
        if remote.state().is_connected() {
            remote.refresh_sensors(false).await;
        }

        let report = StatusReport::collect(&remote);
        let now = chrono::Local::now().format("%H:%M:%S");
        for line in changes(previous.as_ref(), &report) {
            println!("[{now}] {line}");
        }
        previous = Some(report);

        ticks += 1;
        if count.is_some_and(|limit| ticks >= limit) {
            break Ok(());
        }
    };

    remote.disconnect().await;
    result
}

fn state_label(report: &StatusReport) -> &'static str {
    if report.state.is_connected {
        "connected"
    } else if report.state.is_online {
        "online"
    } else {
        "offline"
    }
}

/// Lines describing what changed between two reports
#[must_use]
pub fn changes(previous: Option<&StatusReport>, current: &StatusReport) -> Vec<String> {
    let mut lines = Vec::new();

    let Some(previous) = previous else {
        lines.push(format!("{} is {}", current.name, state_label(current)));
        lines.extend(
            current
                .sensors
                .iter()
                .filter(|s| s.value.is_some())
                .map(|s| format!("{} = {}", s.key, s.display_value())),
        );
        return lines;
    };

    if previous.state != current.state {
        lines.push(format!(
            "{}: {} -> {}",
            current.name,
            state_label(previous),
            state_label(current)
        ));
    }

    let before: HashMap<&str, _> = previous
        .sensors
        .iter()
        .map(|s| (s.key.as_str(), s))
        .collect();
    for sensor in &current.sensors {
        match before.get(sensor.key.as_str()) {
            Some(old) if old.value == sensor.value => {}
            Some(old) => lines.push(format!(
                "{}: {} -> {}",
                sensor.key,
                old.display_value(),
                sensor.display_value()
            )),
            None => lines.push(format!("{} = {} (new)", sensor.key, sensor.display_value())),
        }
    }
    for sensor in &previous.sensors {
        if !current.sensors.iter().any(|s| s.key == sensor.key) {
            lines.push(format!("{} removed", sensor.key));
        }
    }

    lines
}
