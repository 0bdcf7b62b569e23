//! Remote definitions loaded from TOML
//!
//! The default file is `<config dir>/remotectl/remotes.toml`:
//!
//! ```toml
//! [[remotes]]
//! host = "nas.local"
//! name = "NAS"
//! mac = "aa:bb:cc:dd:ee:ff"
//! username = "admin"
//! key_file = "~/.ssh/id_ed25519"
//! allow_turn_off = true
//!
//! [[remotes]]
//! host = "10.0.0.12"
//! collection = "windows"
//! password = "hunter2"
//! host_key_policy = { mode = "auto_add" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::collection::{PROFILE_NAMES, collection_for};
use crate::error::{ConfigError, ConfigResult};
use crate::remote::{Remote, RemoteBuilder, RemoteSettings};
use crate::ssh::{DEFAULT_PORT, HostKeyPolicy, SshAuth};
use crate::tracing::span_names;
use crate::wol::MacAddress;

/// File name of the remotes file inside the configuration directory
pub const REMOTES_FILE: &str = "remotes.toml";

/// Top level of the remotes file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemotesFile {
    /// Remote definitions in file order
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
}

/// One `[[remotes]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Hostname or address
    pub host: String,
    /// Display name, defaults to the host
    #[serde(default)]
    pub name: Option<String>,
    /// MAC address for wake-on-LAN
    #[serde(default)]
    pub mac: Option<MacAddress>,
    /// Command collection profile
    #[serde(default = "default_collection")]
    pub collection: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    #[serde(default = "default_username")]
    pub username: String,
    /// Login password; takes precedence over `key_file`
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    /// Private key file, `~` is expanded
    #[serde(default)]
    pub key_file: Option<String>,
    /// Passphrase of `key_file`
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub passphrase: Option<SecretString>,
    /// Host key verification
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    /// Timeout for opening the SSH session, in seconds
    #[serde(default)]
    pub ssh_timeout_secs: Option<f64>,
    /// Time to wait for a ping reply, in seconds
    #[serde(default)]
    pub ping_timeout_secs: Option<f64>,
    /// Default command timeout, in seconds
    #[serde(default)]
    pub command_timeout_secs: Option<f64>,
    /// Whether the turn-off action may run
    #[serde(default)]
    pub allow_turn_off: bool,
}

fn default_collection() -> String {
    "linux".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    "root".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl RemoteConfig {
    /// Display name: `name` if set, otherwise `host`
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }

    /// Converts the entry into [`RemoteSettings`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for non-positive or non-finite
    /// timeouts.
    pub fn settings(&self) -> ConfigResult<RemoteSettings> {
        let mut settings = RemoteSettings::default()
            .with_username(self.username.clone())
            .with_port(self.port)
            .with_auth(self.auth())
            .with_host_key_policy(expand_policy(&self.host_key_policy))
            .with_allow_turn_off(self.allow_turn_off);

        if let Some(secs) = self.ssh_timeout_secs {
            settings.ssh_timeout = self.timeout("ssh_timeout_secs", secs)?;
        }
        if let Some(secs) = self.ping_timeout_secs {
            settings = settings.with_ping_timeout(self.timeout("ping_timeout_secs", secs)?);
        }
        if let Some(secs) = self.command_timeout_secs {
            settings = settings.with_command_timeout(self.timeout("command_timeout_secs", secs)?);
        }
        Ok(settings)
    }

    fn auth(&self) -> SshAuth {
        if let Some(password) = &self.password {
            return SshAuth::Password(password.clone());
        }
        match &self.key_file {
            Some(path) => SshAuth::KeyFile {
                path: expand_path(path),
                passphrase: self.passphrase.clone(),
            },
            None => SshAuth::Agent,
        }
    }

    fn timeout(&self, field: &str, secs: f64) -> ConfigResult<Duration> {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(self.invalid(format!("{field} must be a positive number, got {secs}")));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| self.invalid(format!("{field}: {e}")))
    }

    fn invalid(&self, reason: String) -> ConfigError {
        ConfigError::Invalid {
            remote: self.display_name().to_string(),
            reason,
        }
    }

    /// Checks the entry and returns a builder for it
    ///
    /// The builder uses the production SSH session, pinger and wake-on-LAN
    /// sender unless the caller replaces them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty host, an unknown
    /// collection profile or a bad timeout.
    pub fn builder(&self) -> ConfigResult<RemoteBuilder> {
        if self.host.trim().is_empty() {
            return Err(self.invalid("host is empty".to_string()));
        }
        let collection = collection_for(&self.collection).ok_or_else(|| {
            self.invalid(format!(
                "unknown collection '{}', expected one of: {}",
                self.collection,
                PROFILE_NAMES.join(", ")
            ))
        })?;

        let mut builder = Remote::builder(self.host.trim())
            .name(self.display_name())
            .collection(collection)
            .settings(self.settings()?);
        if let Some(mac) = self.mac {
            builder = builder.mac_address(mac);
        }
        Ok(builder)
    }

    /// Builds the remote with production capabilities
    ///
    /// # Errors
    ///
    /// See [`RemoteConfig::builder`].
    pub fn build(&self) -> ConfigResult<Remote> {
        Ok(self.builder()?.build())
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn expand_policy(policy: &HostKeyPolicy) -> HostKeyPolicy {
    match policy {
        HostKeyPolicy::KnownHosts(path) => {
            HostKeyPolicy::KnownHosts(expand_path(&path.to_string_lossy()))
        }
        other => other.clone(),
    }
}

impl RemotesFile {
    /// Parses the TOML text of a remotes file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown fields and
    /// [`ConfigError::Invalid`] for duplicate display names.
    pub fn parse(text: &str, path: &Path) -> ConfigResult<Self> {
        let file: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut seen = std::collections::HashSet::new();
        for remote in &file.remotes {
            if !seen.insert(remote.display_name()) {
                return Err(remote.invalid("duplicate remote name".to_string()));
            }
        }
        Ok(file)
    }

    /// Finds a remote by display name or host, case-insensitively
    #[must_use]
    pub fn find(&self, name_or_host: &str) -> Option<&RemoteConfig> {
        self.remotes
            .iter()
            .find(|r| r.display_name() == name_or_host || r.host == name_or_host)
            .or_else(|| {
                self.remotes.iter().find(|r| {
                    r.display_name().eq_ignore_ascii_case(name_or_host)
                        || r.host.eq_ignore_ascii_case(name_or_host)
                })
            })
    }
}

/// Locates and reads the remotes file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `<config dir>/remotectl`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when the platform has no
    /// configuration directory.
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("remotectl");
        Ok(Self { config_dir })
    }

    /// Uses a custom configuration directory
    #[must_use]
    pub const fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// The configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the remotes file
    #[must_use]
    pub fn remotes_path(&self) -> PathBuf {
        self.config_dir.join(REMOTES_FILE)
    }

    /// Loads the remotes file; a missing file yields no remotes
    ///
    /// # Errors
    ///
    /// See [`ConfigManager::load_from`].
    pub fn load(&self) -> ConfigResult<RemotesFile> {
        let path = self.remotes_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No remotes file");
            return Ok(RemotesFile::default());
        }
        Self::load_from(&path)
    }

    /// Loads a remotes file from an explicit path
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the errors of [`RemotesFile::parse`].
    pub fn load_from(path: &Path) -> ConfigResult<RemotesFile> {
        let _span = tracing::debug_span!(span_names::CONFIG_LOAD, path = %path.display()).entered();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file = RemotesFile::parse(&text, path)?;
        tracing::debug!(count = file.remotes.len(), "Loaded remotes");
        Ok(file)
    }
}
