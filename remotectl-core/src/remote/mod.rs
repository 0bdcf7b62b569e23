//! Connection and health state machine for one host
//!
//! A [`Remote`] ties together the SSH [`Connection`], the [`Manager`] over
//! the host's collection and the reachability and wake-on-LAN capabilities.
//! An external scheduler calls [`Remote::update_state`] periodically; each
//! tick runs, strictly in order:
//!
//! 1. a no-op command when already connected (healthy ⇒ done),
//! 2. one ping, which sets `is_online`,
//! 3. a connect attempt when online, which refreshes every sensor command.
//!
//! Callers serialize operations on a given remote; different remotes are
//! independent.

mod connection;
mod state;

pub use connection::Connection;
pub use state::{State, StateEvent, StateField, StateSnapshot};

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Instrument;

use crate::collection::{Collection, action_key, linux, sensor_key};
use crate::command::{CommandContext, CommandOutput};
use crate::error::{ConnectError, RemoteError, RemoteResult};
use crate::manager::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT, Manager};
use crate::ping::{DEFAULT_PING_TIMEOUT, Pinger, SystemPinger};
use crate::sensor::Sensor;
use crate::ssh::{
    ConnectParams, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, HostKeyPolicy, Libssh2Session, SshAuth,
    SshSession,
};
use crate::tracing::span_names;
use crate::wol::{MacAddress, UdpWakeOnLan, WakeOnLan};

/// Command run on an open session to check it is still usable
const HEALTH_CHECK_COMMAND: &str = "";

/// Connection and behavior settings of a remote
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// SSH port
    pub port: u16,
    /// Login user
    pub username: String,
    /// SSH credentials
    pub auth: SshAuth,
    /// Timeout for opening the SSH session
    pub ssh_timeout: Duration,
    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,
    /// Time to wait for a ping reply
    pub ping_timeout: Duration,
    /// Default timeout of commands without their own
    pub command_timeout: Duration,
    /// Whether [`Remote::turn_off`] may run the turn-off action
    pub allow_turn_off: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            username: "root".to_string(),
            auth: SshAuth::Agent,
            ssh_timeout: DEFAULT_CONNECT_TIMEOUT,
            host_key_policy: HostKeyPolicy::default(),
            ping_timeout: DEFAULT_PING_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            allow_turn_off: false,
        }
    }
}

impl RemoteSettings {
    /// Sets the login user
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Authenticates with a password
    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.auth = SshAuth::Password(password);
        self
    }

    /// Sets the credentials
    #[must_use]
    pub fn with_auth(mut self, auth: SshAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the SSH port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Sets the ping timeout
    #[must_use]
    pub const fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Sets the default command timeout
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Allows or forbids [`Remote::turn_off`]
    #[must_use]
    pub const fn with_allow_turn_off(mut self, allow: bool) -> Self {
        self.allow_turn_off = allow;
        self
    }

    fn connect_params(&self, host: &str) -> ConnectParams {
        ConnectParams::new(host, self.username.clone())
            .with_port(self.port)
            .with_auth(self.auth.clone())
            .with_timeout(self.ssh_timeout)
            .with_host_key_policy(self.host_key_policy.clone())
    }
}

/// Builds a [`Remote`], optionally with custom capabilities
pub struct RemoteBuilder {
    host: String,
    name: Option<String>,
    mac_address: Option<MacAddress>,
    collection: Option<Collection>,
    settings: RemoteSettings,
    session: Option<Box<dyn SshSession>>,
    pinger: Option<Arc<dyn Pinger>>,
    wake_on_lan: Option<Arc<dyn WakeOnLan>>,
}

impl RemoteBuilder {
    /// Sets the display name (defaults to the host)
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a static MAC address, preferred over the MAC address sensor
    #[must_use]
    pub const fn mac_address(mut self, mac: MacAddress) -> Self {
        self.mac_address = Some(mac);
        self
    }

    /// Sets the collection (defaults to the Linux profile)
    #[must_use]
    pub fn collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Sets the settings
    #[must_use]
    pub fn settings(mut self, settings: RemoteSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the libssh2 session
    #[must_use]
    pub fn session(mut self, session: Box<dyn SshSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replaces the system ping
    #[must_use]
    pub fn pinger(mut self, pinger: Arc<dyn Pinger>) -> Self {
        self.pinger = Some(pinger);
        self
    }

    /// Replaces the UDP magic packet sender
    #[must_use]
    pub fn wake_on_lan(mut self, wake_on_lan: Arc<dyn WakeOnLan>) -> Self {
        self.wake_on_lan = Some(wake_on_lan);
        self
    }

    /// Builds the remote; nothing is contacted yet
    #[must_use]
    pub fn build(self) -> Remote {
        let name = self.name.unwrap_or_else(|| self.host.clone());
        let collection = Arc::new(self.collection.unwrap_or_else(linux));
        let state = Arc::new(State::new());
        let session = self
            .session
            .unwrap_or_else(|| Box::new(Libssh2Session::new()));
        let connection = Arc::new(Connection::new(
            self.settings.connect_params(&self.host),
            session,
            Arc::clone(&state),
            Arc::clone(&collection),
        ));
        let executor: Arc<dyn CommandExecutor> = connection.clone();
        let manager = Manager::new(name.clone(), collection, executor)
            .with_command_timeout(self.settings.command_timeout);
        let span = tracing::info_span!(span_names::REMOTE, host = %self.host, name = %name);

        Remote {
            host: self.host,
            name,
            mac_address: self.mac_address,
            settings: self.settings,
            manager,
            connection,
            state,
            pinger: self
                .pinger
                .unwrap_or_else(|| Arc::new(SystemPinger::new())),
            wake_on_lan: self
                .wake_on_lan
                .unwrap_or_else(|| Arc::new(UdpWakeOnLan::new())),
            span,
        }
    }
}

/// One controllable host
pub struct Remote {
    host: String,
    name: String,
    mac_address: Option<MacAddress>,
    settings: RemoteSettings,
    manager: Manager,
    connection: Arc<Connection>,
    state: Arc<State>,
    pinger: Arc<dyn Pinger>,
    wake_on_lan: Arc<dyn WakeOnLan>,
    span: tracing::Span,
}

impl Remote {
    /// Starts building a remote for `host`
    #[must_use]
    pub fn builder(host: impl Into<String>) -> RemoteBuilder {
        RemoteBuilder {
            host: host.into(),
            name: None,
            mac_address: None,
            collection: None,
            settings: RemoteSettings::default(),
            session: None,
            pinger: None,
            wake_on_lan: None,
        }
    }

    /// Host name or address
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings
    #[must_use]
    pub const fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Online and connected flags
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The command surface
    #[must_use]
    pub const fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Opens the SSH session, then runs every sensor command once.
    ///
    /// Sensor command failures are logged and do not fail the connect.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Connect`] when the session cannot be opened.
    pub async fn connect(&self) -> RemoteResult<()> {
        async {
            self.connection.connect().await?;
            self.state.update(StateField::Online, true);
            self.manager.refresh_sensors(true).await;
            Ok(())
        }
        .instrument(tracing::info_span!(parent: &self.span, span_names::CONNECT))
        .await
    }

    /// Closes the SSH session and clears every sensor
    pub async fn disconnect(&self) {
        self.connection
            .disconnect()
            .instrument(tracing::info_span!(parent: &self.span, span_names::DISCONNECT))
            .await;
    }

    /// Runs a formatted command string over the session
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Command`] when not connected or when
    /// execution fails; the latter also disconnects.
    pub async fn execute_command_string(
        &self,
        string: &str,
        timeout: Option<Duration>,
    ) -> RemoteResult<CommandOutput> {
        let timeout = timeout.unwrap_or_else(|| self.manager.command_timeout());
        self.manager
            .execute_command_string(string, timeout)
            .instrument(self.span.clone())
            .await
            .map_err(RemoteError::from)
    }

    /// Runs one health-check tick.
    ///
    /// With `raise_errors` false, offline hosts and ordinary connect
    /// failures return `Ok`. Authentication and host key failures are
    /// returned either way.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Offline`] (only with `raise_errors`),
    /// [`RemoteError::Connect`], or nothing at all for a healthy session.
    pub async fn update_state(&self, raise_errors: bool) -> RemoteResult<()> {
        self.health_check(raise_errors)
            .instrument(tracing::info_span!(parent: &self.span, span_names::HEALTH_CHECK))
            .await
    }

    async fn health_check(&self, raise_errors: bool) -> RemoteResult<()> {
        if self.state.is_connected() {
            match self
                .manager
                .execute_command_string(HEALTH_CHECK_COMMAND, self.manager.command_timeout())
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => tracing::debug!(error = %e, "Health check command failed"),
            }
        }

        let is_alive = match self
            .pinger
            .ping(&self.host, 1, self.settings.ping_timeout)
            .await
        {
            Ok(reply) => reply.is_alive,
            Err(e) => {
                tracing::warn!(error = %e, "Ping failed");
                false
            }
        };
        self.state.update(StateField::Online, is_alive);

        if !is_alive {
            tracing::debug!("Host is offline");
            return if raise_errors {
                Err(RemoteError::Offline(self.host.clone()))
            } else {
                Ok(())
            };
        }

        match self.connect().await {
            Err(RemoteError::Connect(ConnectError::Connect { reason, .. })) if !raise_errors => {
                tracing::debug!(%reason, "Connect failed, retrying on the next tick");
                Ok(())
            }
            result => result,
        }
    }

    /// Sends a wake-on-LAN packet unless the host is already online.
    ///
    /// The state is left alone; the next health-check tick notices when the
    /// host comes up.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MacAddressUnavailable`] when no MAC address is
    /// configured or known from the sensor, or [`RemoteError::Wol`].
    pub async fn turn_on(&self) -> RemoteResult<()> {
        if self.state.is_online() {
            tracing::debug!(parent: &self.span, "Already online, not sending magic packet");
            return Ok(());
        }
        let mac = self
            .mac_address()
            .ok_or_else(|| RemoteError::MacAddressUnavailable(self.host.clone()))?;
        self.wake_on_lan.send_magic_packet(&mac).await?;
        tracing::info!(parent: &self.span, %mac, "Sent wake-on-LAN packet");
        Ok(())
    }

    /// Runs the turn-off action when allowed by the settings
    ///
    /// # Errors
    ///
    /// Returns the action's [`RemoteError::Command`].
    pub async fn turn_off(&self) -> RemoteResult<()> {
        if !self.settings.allow_turn_off {
            tracing::info!(parent: &self.span, "Turn off is not allowed for this remote");
            return Ok(());
        }
        self.run_action(action_key::TURN_OFF, CommandContext::new())
            .await?;
        Ok(())
    }

    /// Runs an action command by key
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Command`] for unknown keys and command failures.
    pub async fn run_action(
        &self,
        key: &str,
        context: CommandContext,
    ) -> RemoteResult<CommandOutput> {
        self.manager
            .run_action(key, context)
            .instrument(tracing::info_span!(parent: &self.span, span_names::COMMAND, action = %key))
            .await
            .map_err(RemoteError::from)
    }

    /// Runs stale sensor commands, or all of them when `force` is set
    pub async fn refresh_sensors(&self, force: bool) {
        self.manager
            .refresh_sensors(force)
            .instrument(self.span.clone())
            .await;
    }

    /// Refreshes the given sensors and returns them
    pub async fn poll_sensors<I, K>(&self, keys: I, force: bool) -> Vec<Arc<Sensor>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.manager
            .poll_sensors(keys, force)
            .instrument(self.span.clone())
            .await
    }

    /// The configured MAC address, else the last one the sensor reported
    #[must_use]
    pub fn mac_address(&self) -> Option<MacAddress> {
        self.mac_address.or_else(|| {
            self.manager
                .get_sensor(sensor_key::MAC_ADDRESS)?
                .last_known_value()?
                .as_str()
                .and_then(|raw| MacAddress::parse(raw).ok())
        })
    }

    /// Host name reported by the host
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        self.sensor_string(sensor_key::HOSTNAME)
    }

    /// Operating system name reported by the host
    #[must_use]
    pub fn os_name(&self) -> Option<String> {
        self.sensor_string(sensor_key::OS_NAME)
    }

    /// Operating system version reported by the host
    #[must_use]
    pub fn os_version(&self) -> Option<String> {
        self.sensor_string(sensor_key::OS_VERSION)
    }

    fn sensor_string(&self, key: &str) -> Option<String> {
        self.manager
            .get_sensor(key)?
            .value()
            .map(|value| value.to_string())
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("mac_address", &self.mac_address)
            .field("state", &self.state)
            .field("collection", &self.manager.collection().name())
            .finish_non_exhaustive()
    }
}
