//! Command templates and their execution protocol
//!
//! A [`Command`] is a shell string with `{placeholder}` fields. Fields are
//! filled from a caller-supplied [`CommandContext`] first, then from the
//! manager's sensors; sensors without a value are polled before formatting.
//! The formatted string runs over the remote's connection through the
//! [`Manager`].
//!
//! [`ActionCommand`]s are one-shot operations (restart, shutdown).
//! [`SensorCommand`]s feed their output into sensors.

mod action;
mod sensor_command;
mod template;

pub use action::ActionCommand;
pub use sensor_command::{SensorCommand, SensorSlot};
pub use template::Template;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::manager::Manager;

/// Named values available to a command's placeholders
pub type CommandContext = HashMap<String, String>;

/// String transform applied to command strings or raw sensor output
pub type Renderer = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Output of one command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// When the command finished
    pub timestamp: DateTime<Utc>,
    /// Standard output, one entry per line
    pub stdout: Vec<String>,
    /// Standard error, one entry per line
    pub stderr: Vec<String>,
    /// Process exit code
    pub exit_code: i32,
}

impl CommandOutput {
    /// Creates an output stamped with the current time
    #[must_use]
    pub fn new(stdout: Vec<String>, stderr: Vec<String>, exit_code: i32) -> Self {
        Self {
            timestamp: Utc::now(),
            stdout,
            stderr,
            exit_code,
        }
    }

    /// True when the command exited with status 0
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command template
#[derive(Clone)]
pub struct Command {
    string: String,
    timeout: Option<Duration>,
    renderer: Option<Renderer>,
}

impl Command {
    /// Creates a command from a template string
    #[must_use]
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            timeout: None,
            renderer: None,
        }
    }

    /// Overrides the manager's default timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a transform applied to the formatted string
    #[must_use]
    pub fn with_renderer(
        mut self,
        renderer: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// The template string
    #[must_use]
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Timeout override
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Placeholder names found in the template
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Format`] if the template is malformed.
    pub fn field_keys(&self) -> Result<Vec<String>, CommandError> {
        let template = Template::parse(&self.string)?;
        Ok(template.field_keys().into_iter().map(String::from).collect())
    }

    /// Resolves every placeholder and renders the command string.
    ///
    /// Keys that are not sensor keys must be present in `context`. Sensor
    /// keys missing from `context` take the sensor's current value; sensors
    /// without a value are polled once, together, before rendering.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Format`] when a key cannot be resolved, a
    /// polled sensor still has no value, or the renderer fails.
    pub async fn format(
        &self,
        manager: &Manager,
        mut context: CommandContext,
    ) -> Result<String, CommandError> {
        let template = Template::parse(&self.string)?;
        let sensors = manager.sensors_by_key();
        let keys = template.field_keys();

        for key in keys.iter().filter(|key| !sensors.contains_key(**key)) {
            if !context.contains_key(*key) {
                return Err(CommandError::Format(format!(
                    "Missing value for '{key}' in '{}'",
                    self.string
                )));
            }
        }

        let unresolved: Vec<_> = keys
            .iter()
            .filter(|key| !context.contains_key(**key))
            .filter_map(|key| sensors.get(*key).map(|sensor| (*key, sensor)))
            .collect();
        let mut to_poll = BTreeSet::new();
        for (key, sensor) in unresolved {
            match sensor.value() {
                Some(value) => {
                    context.insert(key.to_string(), value.to_string());
                }
                None => {
                    to_poll.insert(key.to_string());
                }
            }
        }

        if !to_poll.is_empty() {
            let polled: HashMap<String, _> = manager
                .poll_sensors(to_poll.iter().cloned(), true)
                .await
                .into_iter()
                .map(|sensor| (sensor.key().to_string(), sensor.value()))
                .collect();
            for key in to_poll {
                let Some(Some(value)) = polled.get(&key) else {
                    return Err(CommandError::Format(format!(
                        "Sensor '{key}' has no value for '{}'",
                        self.string
                    )));
                };
                let value = value.to_string();
                context.insert(key, value);
            }
        }

        let formatted = template.render(&context)?;
        match &self.renderer {
            Some(renderer) => renderer(&formatted).map_err(|e| {
                CommandError::Format(format!("Renderer failed for '{formatted}': {e}"))
            }),
            None => Ok(formatted),
        }
    }

    /// Formats the command and runs it over the manager's connection.
    ///
    /// # Errors
    ///
    /// Returns the format error or the execute error; both are logged.
    pub async fn execute(
        &self,
        manager: &Manager,
        context: CommandContext,
    ) -> Result<CommandOutput, CommandError> {
        let string = self.format(manager, context).await.inspect_err(|e| {
            tracing::warn!(command = %self.string, error = %e, "Failed to format command");
        })?;

        let timeout = self.timeout.unwrap_or_else(|| manager.command_timeout());
        let output = manager
            .execute_command_string(&string, timeout)
            .await
            .inspect_err(|e| {
                tracing::warn!(command = %string, error = %e, "Failed to execute command");
            })?;

        tracing::debug!(
            command = %string,
            stdout = ?output.stdout,
            stderr = ?output.stderr,
            exit_code = output.exit_code,
            "Executed command"
        );
        Ok(output)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("string", &self.string)
            .field("timeout", &self.timeout)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}
