//! SSH session lifecycle and command execution over it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::state::{State, StateField};
use crate::collection::Collection;
use crate::command::CommandOutput;
use crate::error::{CommandError, ConnectError, SshError};
use crate::manager::CommandExecutor;
use crate::ssh::{ConnectParams, SshSession};

/// The SSH session of one remote
///
/// The session mutex serializes connect, exec and close, so one operation
/// at a time reaches the session. Any execution failure tears the session
/// down and clears every sensor of the collection. Closing is bounded by
/// the connect timeout, so a session that will not close still ends up
/// disconnected.
pub struct Connection {
    params: ConnectParams,
    session: Mutex<Box<dyn SshSession>>,
    state: Arc<State>,
    collection: Arc<Collection>,
}

impl Connection {
    /// Wraps `session`; nothing is opened until [`Connection::connect`]
    #[must_use]
    pub fn new(
        params: ConnectParams,
        session: Box<dyn SshSession>,
        state: Arc<State>,
        collection: Arc<Collection>,
    ) -> Self {
        Self {
            params,
            session: Mutex::new(session),
            state,
            collection,
        }
    }

    /// Connection parameters
    #[must_use]
    pub const fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Opens the session and marks the remote connected.
    ///
    /// On failure the session is closed and the disconnect cleanup runs
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the session's [`ConnectError`].
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let mut session = self.session.lock().await;
        match session.connect(&self.params).await {
            Ok(()) => {
                self.state.update(StateField::Connected, true);
                tracing::info!(
                    host = %self.params.host,
                    port = self.params.port,
                    user = %self.params.username,
                    "Connected"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(host = %self.params.host, error = %e, "Failed to connect");
                self.close_session(&mut **session).await;
                self.disconnect_locked(&mut **session, "connect failed")
                    .await;
                Err(e)
            }
        }
    }

    /// Closes the session; does nothing when already disconnected
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        self.disconnect_locked(&mut **session, "requested").await;
    }

    async fn close_session(&self, session: &mut dyn SshSession) {
        match tokio::time::timeout(self.params.timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(host = %self.params.host, error = %e, "Failed to close session");
            }
            Err(_) => {
                tracing::warn!(
                    host = %self.params.host,
                    timeout = ?self.params.timeout,
                    "Gave up waiting for the session to close"
                );
            }
        }
    }

    async fn disconnect_locked(&self, session: &mut dyn SshSession, cause: &str) {
        if !self.state.is_connected() {
            return;
        }

        self.close_session(session).await;
        self.state.update(StateField::Connected, false);
        for command in self.collection.sensor_commands() {
            command.update_sensors(None);
        }
        tracing::info!(host = %self.params.host, cause, "Disconnected");
    }
}

#[async_trait]
impl CommandExecutor for Connection {
    async fn execute_command_string(
        &self,
        string: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let mut session = self.session.lock().await;
        if !self.state.is_connected() {
            return Err(CommandError::Execute("Not connected".to_string()));
        }

        tracing::trace!(host = %self.params.host, command = %string, "Executing");
        match tokio::time::timeout(timeout, session.exec(string, timeout)).await {
            Ok(Ok(output)) => Ok(output.into()),
            Ok(Err(SshError::Deadline(_))) | Err(_) => {
                tracing::warn!(host = %self.params.host, command = %string, ?timeout, "Execution timed out");
                self.disconnect_locked(&mut **session, "execution timed out")
                    .await;
                Err(CommandError::Timeout(timeout))
            }
            Ok(Err(e)) => {
                tracing::warn!(host = %self.params.host, command = %string, error = %e, "Execution failed");
                self.disconnect_locked(&mut **session, "execution failed")
                    .await;
                Err(CommandError::Execute(format!(
                    "Disconnected during or after execution: {e}"
                )))
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.params.host)
            .field("port", &self.params.port)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
