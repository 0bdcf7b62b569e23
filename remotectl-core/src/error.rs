//! Error types for `remotectl`
//!
//! Each layer owns its error enum: sensors fail to coerce or validate,
//! commands fail to format or execute, sessions fail to connect, and the
//! remote state machine adds the offline and wake-on-LAN cases on top.

use std::time::Duration;

use thiserror::Error;

use crate::sensor::ValueType;
use crate::wol::WolError;

/// Errors raised while turning raw command output into a sensor value
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    /// Raw output could not be converted to the sensor's value type
    #[error("Sensor '{key}': cannot convert '{raw}' to {value_type}: {reason}")]
    Coerce {
        /// Sensor key
        key: String,
        /// Raw string that failed to convert
        raw: String,
        /// Target value type
        value_type: ValueType,
        /// Why the conversion failed
        reason: String,
    },

    /// Converted value violates the sensor's declared bounds
    #[error("Sensor '{key}': value '{value}' rejected: {reason}")]
    Validate {
        /// Sensor key
        key: String,
        /// Rendered value that was rejected
        value: String,
        /// Which bound was violated
        reason: String,
    },
}

/// Errors raised while formatting or executing a command
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// A placeholder could not be resolved or the renderer failed
    #[error("Cannot format command: {0}")]
    Format(String),

    /// The command could not be run over the connection
    #[error("Cannot execute command: {0}")]
    Execute(String),

    /// The command did not finish within its timeout
    #[error("Command timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// No action command is registered under the key
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A value passed to a controllable sensor was rejected
    #[error(transparent)]
    InvalidValue(#[from] SensorError),
}

impl CommandError {
    /// Returns true for errors that happened while running the command
    /// over the connection (including timeouts)
    #[must_use]
    pub const fn is_execute(&self) -> bool {
        matches!(self, Self::Execute(_) | Self::Timeout(_))
    }

    /// Returns true for placeholder resolution and renderer failures
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Result type alias for command operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors raised while opening an SSH session
///
/// The variants are mutually exclusive by cause. Host key and authentication
/// failures point at configuration problems; everything else is reported as
/// [`ConnectError::Connect`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The server presented a host key the policy does not accept
    #[error("Host key for {host} is unknown: {fingerprint}")]
    HostKeyUnknown {
        /// Remote host
        host: String,
        /// Hex fingerprint of the presented key
        fingerprint: String,
    },

    /// The server rejected the configured credentials
    #[error("Authentication failed for {user}@{host}: {reason}")]
    Auth {
        /// Remote host
        host: String,
        /// Login user
        user: String,
        /// Server or library message
        reason: String,
    },

    /// Any other failure (resolution, TCP, handshake, timeout)
    #[error("Cannot connect to {host}: {reason}")]
    Connect {
        /// Remote host
        host: String,
        /// Underlying failure
        reason: String,
    },
}

/// Errors raised by an open SSH session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SshError {
    /// The session has not been opened or was closed
    #[error("SSH session is not open")]
    NotOpen,

    /// Transport or channel failure
    #[error("SSH transport error: {0}")]
    Transport(String),

    /// The remote command was still running when its time ran out
    #[error("Remote command still running after {}s", .0.as_secs_f64())]
    Deadline(Duration),
}

/// Errors raised by the reachability probe
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PingError {
    /// The ping process could not be started
    #[error("Failed to run ping: {0}")]
    Spawn(String),

    /// The ping process did not finish in time
    #[error("Ping timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by the remote state machine
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The host did not answer the reachability probe
    #[error("Host {0} is offline")]
    Offline(String),

    /// Turn-on was requested but no MAC address is known
    #[error("MAC address of {0} is unavailable")]
    MacAddressUnavailable(String),

    /// Command formatting or execution failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Opening the SSH session failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Sending the magic packet failed
    #[error(transparent)]
    Wol(#[from] WolError),
}

/// Result type alias for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors raised while loading remote definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read {path}: {reason}")]
    Read {
        /// File path
        path: String,
        /// IO error message
        reason: String,
    },

    /// The configuration file is not valid TOML for the schema
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File path
        path: String,
        /// Parser message
        reason: String,
    },

    /// A remote definition is inconsistent
    #[error("Invalid remote '{remote}': {reason}")]
    Invalid {
        /// Remote name or host
        remote: String,
        /// What is wrong with it
        reason: String,
    },

    /// No configuration directory could be determined
    #[error("Cannot determine configuration directory")]
    NoConfigDir,
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error for applications embedding `remotectl-core`
#[derive(Debug, Error)]
pub enum RemotectlError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote state machine error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
