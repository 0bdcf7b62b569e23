//! `remotectl` Core Library
//!
//! Remote control and monitoring of hosts over SSH: typed sensors fed by
//! shell commands, action commands, per-OS command collections and a
//! connection/health state machine per host.
//!
//! # Crate Structure
//!
//! - [`sensor`] - Typed values, bounds, payload mapping and dynamic sensors
//! - [`command`] - Templated commands; action and sensor commands
//! - [`collection`] - Linux and Windows PowerShell command profiles
//! - [`manager`] - Key-based lookup, polling and action dispatch
//! - [`remote`] - Online/connected state machine, power on/off
//! - [`ssh`] / [`ping`] / [`wol`] - Transport, reachability and wake-on-LAN
//! - [`config`] - Remote definitions from TOML
//! - [`testing`] - In-memory sessions, pingers and packet senders

#![warn(missing_docs)]

pub mod collection;
pub mod command;
pub mod config;
pub mod error;
pub mod manager;
pub mod ping;
pub mod remote;
pub mod sensor;
pub mod ssh;
pub mod testing;
pub mod tracing;
pub mod wol;

pub use collection::{Collection, collection_for, linux, windows_powershell};
pub use command::{
    ActionCommand, Command, CommandContext, CommandOutput, SensorCommand, SensorSlot, Template,
};
pub use config::{ConfigManager, RemoteConfig, RemotesFile};
pub use error::{
    CommandError, CommandResult, ConfigError, ConfigResult, ConnectError, PingError, RemoteError,
    RemoteResult, RemotectlError, SensorError, SshError,
};
pub use manager::{CommandExecutor, Manager};
pub use ping::{Pinger, SystemPinger};
pub use remote::{Remote, RemoteBuilder, RemoteSettings, State, StateEvent, StateField};
pub use sensor::{DynamicSensor, Sensor, SensorSpec, SensorValue, ValueType};
pub use ssh::{ConnectParams, HostKeyPolicy, Libssh2Session, SshAuth, SshSession};
pub use tracing::{TracingConfig, TracingError, TracingLevel, TracingOutput, init_tracing};
pub use wol::{MacAddress, UdpWakeOnLan, WakeOnLan, WolError};
