//! Platform profiles: named bundles of action and sensor commands
//!
//! A [`Collection`] is static data describing how to talk to one kind of
//! host. Two reference profiles ship with the crate, [`linux`] and
//! [`windows_powershell`]; [`collection_for`] resolves them by name.

mod linux;
mod windows;

pub use linux::linux;
pub use windows::windows_powershell;

use std::sync::Arc;

use crate::command::{ActionCommand, SensorCommand};

/// Keys of the action commands the reference profiles define
pub mod action_key {
    /// Powers the host off
    pub const TURN_OFF: &str = "turn_off";
    /// Reboots the host
    pub const RESTART: &str = "restart";
}

/// Keys of the sensors the reference profiles define
pub mod sensor_key {
    /// MAC address of the default interface
    pub const MAC_ADDRESS: &str = "mac_address";
    /// Whether wake-on-LAN is armed
    pub const WAKE_ON_LAN: &str = "wake_on_lan";
    /// Name of the default network interface
    pub const INTERFACE: &str = "interface";
    /// Operating system name
    pub const OS_NAME: &str = "os_name";
    /// Operating system version
    pub const OS_VERSION: &str = "os_version";
    /// Kernel or build release string
    pub const OS_RELEASE: &str = "os_release";
    /// Host name
    pub const HOSTNAME: &str = "hostname";
    /// Hardware architecture
    pub const MACHINE_TYPE: &str = "machine_type";
    /// Installed memory in MB
    pub const TOTAL_MEMORY: &str = "total_memory";
    /// Available memory in MB
    pub const FREE_MEMORY: &str = "free_memory";
    /// Free space per mount point in MB
    pub const FREE_DISK_SPACE: &str = "free_disk_space";
    /// CPU load
    pub const CPU_LOAD: &str = "cpu_load";
    /// CPU temperature in °C
    pub const TEMPERATURE: &str = "temperature";
    /// Device model
    pub const DEVICE_NAME: &str = "device_name";
    /// Operating system architecture
    pub const OS_ARCHITECTURE: &str = "os_architecture";
}

/// Names accepted by [`collection_for`]
pub const PROFILE_NAMES: &[&str] = &["linux", "windows"];

/// A named bundle of action and sensor commands
#[derive(Debug, Default)]
pub struct Collection {
    name: String,
    action_commands: Vec<Arc<ActionCommand>>,
    sensor_commands: Vec<Arc<SensorCommand>>,
}

impl Collection {
    /// Creates an empty collection
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an action command
    #[must_use]
    pub fn with_action(mut self, command: ActionCommand) -> Self {
        self.action_commands.push(Arc::new(command));
        self
    }

    /// Adds a sensor command
    #[must_use]
    pub fn with_sensor_command(mut self, command: SensorCommand) -> Self {
        self.sensor_commands.push(Arc::new(command));
        self
    }

    /// Profile name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action commands in definition order
    #[must_use]
    pub fn action_commands(&self) -> &[Arc<ActionCommand>] {
        &self.action_commands
    }

    /// Sensor commands in definition order
    #[must_use]
    pub fn sensor_commands(&self) -> &[Arc<SensorCommand>] {
        &self.sensor_commands
    }

    /// Finds an action command by key
    #[must_use]
    pub fn action(&self, key: &str) -> Option<Arc<ActionCommand>> {
        self.action_commands
            .iter()
            .find(|command| command.key() == key)
            .cloned()
    }
}

/// Resolves a reference profile by name (case-insensitive)
///
/// Accepts `linux`, `windows` and `windows_powershell`.
#[must_use]
pub fn collection_for(name: &str) -> Option<Collection> {
    match name.to_ascii_lowercase().as_str() {
        "linux" => Some(linux()),
        "windows" | "windows_powershell" | "powershell" => Some(windows_powershell()),
        _ => None,
    }
}

/// Parses a temperature reported in millidegrees
pub(crate) fn millidegrees_to_celsius(raw: &str) -> Result<String, String> {
    raw.trim()
        .parse::<f64>()
        .map(|milli| (milli / 1000.0).to_string())
        .map_err(|e| e.to_string())
}
