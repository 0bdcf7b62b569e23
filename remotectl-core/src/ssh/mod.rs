//! SSH session capability
//!
//! The remote state machine drives a [`SshSession`]: open it, run command
//! strings over it, close it. [`Libssh2Session`] is the production
//! implementation on top of the `ssh2` crate; tests use
//! [`MockSession`](crate::testing::MockSession).

mod libssh2;

pub use libssh2::Libssh2Session;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::command::CommandOutput;
use crate::error::{ConnectError, SshError};

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default timeout for opening a session
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How to authenticate
#[derive(Debug, Clone, Default)]
pub enum SshAuth {
    /// Keyboard password
    Password(SecretString),
    /// Private key file, optionally encrypted
    KeyFile {
        /// Path to the private key
        path: PathBuf,
        /// Passphrase of an encrypted key
        passphrase: Option<SecretString>,
    },
    /// Keys held by a running ssh-agent
    #[default]
    Agent,
}

/// What to do with host keys that are not in the known hosts file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "path")]
pub enum HostKeyPolicy {
    /// Trust on first use and record the key in `~/.ssh/known_hosts`
    AutoAdd,
    /// Reject keys missing from `~/.ssh/known_hosts`
    #[default]
    RejectUnknown,
    /// Reject keys missing from the given known hosts file
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    /// Known hosts file consulted by this policy
    #[must_use]
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        match self {
            Self::KnownHosts(path) => Some(path.clone()),
            Self::AutoAdd | Self::RejectUnknown => {
                dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
            }
        }
    }
}

/// Parameters for opening a session
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Credentials
    pub auth: SshAuth,
    /// Timeout for TCP connect, handshake and authentication
    pub timeout: Duration,
    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,
}

impl ConnectParams {
    /// Creates parameters with agent authentication and default settings
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            auth: SshAuth::default(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Sets the port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials
    #[must_use]
    pub fn with_auth(mut self, auth: SshAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the connect timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }
}

/// Output of a command run over a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output lines
    pub stdout: Vec<String>,
    /// Standard error lines
    pub stderr: Vec<String>,
    /// Exit status of the remote process
    pub exit_code: i32,
}

impl ExecOutput {
    /// Splits raw output streams into lines
    #[must_use]
    pub fn from_streams(stdout: &str, stderr: &str, exit_code: i32) -> Self {
        Self {
            stdout: split_lines(stdout),
            stderr: split_lines(stderr),
            exit_code,
        }
    }
}

impl From<ExecOutput> for CommandOutput {
    fn from(output: ExecOutput) -> Self {
        Self::new(output.stdout, output.stderr, output.exit_code)
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// One SSH session to one host
///
/// Implementations are driven by a single in-flight operation at a time.
#[async_trait]
pub trait SshSession: Send + Sync {
    /// Opens the session, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] classified by cause.
    async fn connect(&mut self, params: &ConnectParams) -> Result<(), ConnectError>;

    /// Runs `command` and collects its output
    ///
    /// # Errors
    ///
    /// Returns [`SshError::NotOpen`] without a session,
    /// [`SshError::Deadline`] when the command outlives `timeout`, or
    /// [`SshError::Transport`] for channel and IO failures.
    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput, SshError>;

    /// Closes the session; closing a closed session succeeds.
    ///
    /// Must not wait for an exec abandoned by its caller to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::Transport`] if the disconnect message fails.
    async fn close(&mut self) -> Result<(), SshError>;
}
