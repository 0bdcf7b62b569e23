//! Reachability probe
//!
//! [`SystemPinger`] runs the platform `ping` binary, which needs no raw
//! socket privileges. The exit status tells whether any echo reply arrived.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::PingError;

/// Default time to wait for an echo reply
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra time granted to the ping process on top of the reply timeout
const PROCESS_GRACE: Duration = Duration::from_secs(1);

/// Result of a reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReply {
    /// True when at least one echo reply arrived
    pub is_alive: bool,
}

/// Checks whether a host answers ICMP echo requests
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Sends `count` echo requests, waiting `timeout` for each reply
    ///
    /// # Errors
    ///
    /// Returns a [`PingError`] when the probe itself could not run. An
    /// unreachable host is `Ok` with `is_alive == false`.
    async fn ping(&self, host: &str, count: u32, timeout: Duration)
    -> Result<PingReply, PingError>;
}

/// [`Pinger`] backed by the system `ping` command
#[derive(Debug, Clone)]
pub struct SystemPinger {
    program: String,
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }
}

impl SystemPinger {
    /// Creates a pinger using `ping` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different ping executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, host: &str, count: u32, timeout: Duration) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(ping_args(host, count, timeout));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(
        &self,
        host: &str,
        count: u32,
        timeout: Duration,
    ) -> Result<PingReply, PingError> {
        let count = count.max(1);
        let deadline = timeout * count + PROCESS_GRACE;
        let mut cmd = self.command(host, count, timeout);

        match tokio::time::timeout(deadline, cmd.status()).await {
            Ok(Ok(status)) => {
                tracing::trace!(host, ?status, "Ping finished");
                Ok(PingReply {
                    is_alive: status.success(),
                })
            }
            Ok(Err(e)) => Err(PingError::Spawn(e.to_string())),
            Err(_) => Err(PingError::Timeout(deadline)),
        }
    }
}

#[cfg(target_os = "windows")]
fn ping_args(host: &str, count: u32, timeout: Duration) -> Vec<String> {
    vec![
        "-n".to_string(),
        count.to_string(),
        "-w".to_string(),
        timeout.as_millis().max(1).to_string(),
        host.to_string(),
    ]
}

#[cfg(target_os = "macos")]
fn ping_args(host: &str, count: u32, timeout: Duration) -> Vec<String> {
    vec![
        "-n".to_string(),
        "-q".to_string(),
        "-c".to_string(),
        count.to_string(),
        "-W".to_string(),
        timeout.as_millis().max(1).to_string(),
        host.to_string(),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn ping_args(host: &str, count: u32, timeout: Duration) -> Vec<String> {
    // iputils only takes whole seconds
    let seconds = timeout.as_secs_f64().ceil().max(1.0) as u64;
    vec![
        "-n".to_string(),
        "-q".to_string(),
        "-c".to_string(),
        count.to_string(),
        "-W".to_string(),
        seconds.to_string(),
        host.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    #[test]
    fn test_linux_args_round_timeout_up() {
        let args = ping_args("nas.local", 1, Duration::from_millis(1500));
        assert_eq!(args, vec!["-n", "-q", "-c", "1", "-W", "2", "nas.local"]);

        let args = ping_args("nas.local", 3, Duration::from_millis(10));
        assert_eq!(args, vec!["-n", "-q", "-c", "3", "-W", "1", "nas.local"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let pinger = SystemPinger::new().with_program("/nonexistent/ping-binary");
        let err = pinger
            .ping("127.0.0.1", 1, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PingError::Spawn(_)));
    }
}
