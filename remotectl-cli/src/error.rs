//! CLI error types and exit codes.

use remotectl_core::{ConfigError, RemoteError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - the remote is offline or the SSH session could
    /// not be established
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote not found in the configuration
    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    /// The remote could not be reached or connected to
    #[error("Connection error: {0}")]
    Connection(String),

    /// Command formatting or execution failed
    #[error("Command error: {0}")]
    Command(String),

    /// Wake-on-LAN error
    #[error("Wake-on-LAN error: {0}")]
    Wol(String),

    /// Output serialization error
    #[error("Output error: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<RemoteError> for CliError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Offline(_) | RemoteError::Connect(_) => Self::Connection(err.to_string()),
            RemoteError::Command(e) => Self::Command(e.to_string()),
            RemoteError::MacAddressUnavailable(_) | RemoteError::Wol(_) => {
                Self::Wol(err.to_string())
            }
        }
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, command, output, IO)
    /// - 2: Connection failure (offline, SSH failure, unknown remote)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) | Self::RemoteNotFound(_) => exit_codes::CONNECTION_FAILURE,
            Self::Config(_) | Self::Command(_) | Self::Wol(_) | Self::Output(_) | Self::Io(_) => {
                exit_codes::GENERAL_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotectl_core::{CommandError, ConnectError};

    #[test]
    fn test_remote_errors_map_to_exit_codes() {
        let offline: CliError = RemoteError::Offline("nas".to_string()).into();
        assert_eq!(offline.exit_code(), exit_codes::CONNECTION_FAILURE);

        let refused: CliError = RemoteError::Connect(ConnectError::Connect {
            host: "nas".to_string(),
            reason: "Connection refused".to_string(),
        })
        .into();
        assert_eq!(refused.exit_code(), exit_codes::CONNECTION_FAILURE);

        let unknown: CliError =
            RemoteError::Command(CommandError::UnknownCommand("fly".to_string())).into();
        assert_eq!(unknown.exit_code(), exit_codes::GENERAL_ERROR);
        assert!(unknown.to_string().contains("fly"));
    }

    #[test]
    fn test_config_error_is_general() {
        let err: CliError = ConfigError::NoConfigDir.into();
        assert_eq!(err.exit_code(), exit_codes::GENERAL_ERROR);
    }
}
