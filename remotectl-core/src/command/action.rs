//! One-shot action commands

use std::collections::BTreeMap;
use std::time::Duration;

use super::{Command, CommandContext, CommandOutput};
use crate::error::CommandError;
use crate::manager::Manager;
use crate::sensor::slugify;

/// An imperative operation with no associated sensors (restart, shutdown)
#[derive(Debug, Clone)]
pub struct ActionCommand {
    name: String,
    key: String,
    options: BTreeMap<String, String>,
    command: Command,
}

impl ActionCommand {
    /// Creates an action whose key is derived from the name
    #[must_use]
    pub fn new(name: impl Into<String>, string: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: slugify(&name),
            name,
            options: BTreeMap::new(),
            command: Command::new(string),
        }
    }

    /// Sets an explicit key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Adds a free-form option
    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Overrides the manager's default timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command = self.command.with_timeout(timeout);
        self
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Free-form options
    #[must_use]
    pub const fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// The underlying command template
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Formats and runs the action
    ///
    /// # Errors
    ///
    /// Returns the command's format or execute error.
    pub async fn execute(
        &self,
        manager: &Manager,
        context: CommandContext,
    ) -> Result<CommandOutput, CommandError> {
        tracing::info!(action = %self.key, "Running action");
        self.command.execute(manager, context).await
    }
}
