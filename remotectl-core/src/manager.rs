//! Lookup and orchestration over one collection
//!
//! The [`Manager`] is the command surface of a single remote: it resolves
//! sensors and commands by key, polls sensor commands respecting their
//! intervals and runs action commands. Running a command string is delegated
//! to a [`CommandExecutor`], normally the remote's SSH connection.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::collection::Collection;
use crate::command::{ActionCommand, CommandContext, CommandOutput, SensorCommand};
use crate::error::CommandError;
use crate::sensor::{DynamicSensor, Sensor};

/// Default timeout for commands without their own
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs a formatted command string on the target host
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes `string` and waits at most `timeout` for it to finish
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Execute`] or [`CommandError::Timeout`].
    async fn execute_command_string(
        &self,
        string: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// The command surface of one remote
pub struct Manager {
    name: String,
    command_timeout: Duration,
    collection: Arc<Collection>,
    executor: Arc<dyn CommandExecutor>,
}

impl Manager {
    /// Creates a manager over `collection` that runs commands through `executor`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        collection: Arc<Collection>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            collection,
            executor,
        }
    }

    /// Sets the default command timeout
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Manager name, usually the remote's name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timeout used by commands without their own
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// The managed collection
    #[must_use]
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    /// Every scalar sensor by key, dynamic children included.
    ///
    /// Built from the collection on each call so children added or removed
    /// by the last poll are always visible.
    #[must_use]
    pub fn sensors_by_key(&self) -> HashMap<String, Arc<Sensor>> {
        self.collection
            .sensor_commands()
            .iter()
            .flat_map(|command| command.scalar_sensors())
            .map(|sensor| (sensor.key().to_string(), sensor))
            .collect()
    }

    /// Every dynamic sensor by key
    #[must_use]
    pub fn dynamic_sensors_by_key(&self) -> HashMap<String, Arc<DynamicSensor>> {
        self.collection
            .sensor_commands()
            .iter()
            .flat_map(|command| command.dynamic_sensors())
            .map(|sensor| (sensor.key().to_string(), sensor))
            .collect()
    }

    /// Every action command by key
    #[must_use]
    pub fn commands_by_key(&self) -> HashMap<String, Arc<ActionCommand>> {
        self.collection
            .action_commands()
            .iter()
            .map(|command| (command.key().to_string(), Arc::clone(command)))
            .collect()
    }

    /// Finds a scalar sensor or dynamic child by key
    #[must_use]
    pub fn get_sensor(&self, key: &str) -> Option<Arc<Sensor>> {
        self.collection
            .sensor_commands()
            .iter()
            .flat_map(|command| command.scalar_sensors())
            .find(|sensor| sensor.key() == key)
    }

    /// Finds a dynamic sensor by key
    #[must_use]
    pub fn get_dynamic_sensor(&self, key: &str) -> Option<Arc<DynamicSensor>> {
        self.collection
            .sensor_commands()
            .iter()
            .flat_map(|command| command.dynamic_sensors())
            .find(|sensor| sensor.key() == key)
    }

    /// Finds an action command by key
    #[must_use]
    pub fn get_command(&self, key: &str) -> Option<Arc<ActionCommand>> {
        self.collection.action(key)
    }

    /// Finds the sensor command that feeds the sensor `key`
    #[must_use]
    pub fn get_sensor_command(&self, key: &str) -> Option<Arc<SensorCommand>> {
        self.collection
            .sensor_commands()
            .iter()
            .find(|command| command.owns(key))
            .cloned()
    }

    /// Refreshes the sensors `keys` and returns them.
    ///
    /// Each owning sensor command runs at most once, and only when it is
    /// stale or `force` is set. Commands run concurrently; their failures
    /// are logged and leave the affected sensors without a value. Unknown
    /// keys are skipped.
    pub fn poll_sensors<I, K>(&self, keys: I, force: bool) -> BoxFuture<'_, Vec<Arc<Sensor>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        async move {
            let commands: Vec<Arc<SensorCommand>> = self
                .collection
                .sensor_commands()
                .iter()
                .filter(|command| keys.iter().any(|key| command.owns(key)))
                .filter(|command| force || command.needs_update())
                .cloned()
                .collect();

            tracing::debug!(
                manager = %self.name,
                keys = ?keys,
                commands = commands.len(),
                force,
                "Polling sensors"
            );

            let results = join_all(
                commands
                    .iter()
                    .map(|command| command.execute(self, CommandContext::new())),
            )
            .await;
            for (command, result) in commands.iter().zip(results) {
                if let Err(e) = result {
                    tracing::debug!(
                        command = %command.command().string(),
                        error = %e,
                        "Sensor poll failed"
                    );
                }
            }

            let sensors = self.sensors_by_key();
            keys.iter()
                .filter_map(|key| sensors.get(key).cloned())
                .collect()
        }
        .boxed()
    }

    /// Runs every stale sensor command, or all of them when `force` is set
    pub async fn refresh_sensors(&self, force: bool) {
        for command in self.collection.sensor_commands() {
            if !force && !command.needs_update() {
                continue;
            }
            if let Err(e) = command.execute(self, CommandContext::new()).await {
                tracing::debug!(
                    command = %command.command().string(),
                    error = %e,
                    "Sensor refresh failed"
                );
            }
        }
    }

    /// Runs the action command `key`
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownCommand`] for an unknown key, or the
    /// action's format/execute error.
    pub async fn run_action(
        &self,
        key: &str,
        context: CommandContext,
    ) -> Result<CommandOutput, CommandError> {
        let command = self
            .get_command(key)
            .ok_or_else(|| CommandError::UnknownCommand(key.to_string()))?;
        command.execute(self, context).await
    }

    /// Runs an already formatted command string through the executor
    ///
    /// # Errors
    ///
    /// Returns the executor's error.
    pub async fn execute_command_string(
        &self,
        string: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.executor.execute_command_string(string, timeout).await
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.name)
            .field("command_timeout", &self.command_timeout)
            .field("collection", &self.collection.name())
            .finish_non_exhaustive()
    }
}
