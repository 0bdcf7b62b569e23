//! Sensors: typed, named values parsed from command output
//!
//! A [`Sensor`] holds the last value a [`SensorCommand`](crate::command::SensorCommand)
//! parsed for it. Values only change through [`Sensor::update`], which the
//! owning command calls after every execution. Every update, including one
//! that clears the value, is broadcast to subscribers as a [`SensorEvent`].
//!
//! A [`DynamicSensor`] is a sensor whose value is a list of child sensors,
//! one per id found in the output (for example one per mounted filesystem).

mod dynamic;
mod value;

pub use dynamic::{DEFAULT_SEPARATOR, DynamicSensor};
pub use value::{BoolPayloads, SensorValue, ValueType};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use tokio::sync::broadcast;

use crate::command::{Command, CommandContext, Renderer};
use crate::error::{CommandError, SensorError};
use crate::manager::Manager;

/// Capacity of each sensor's event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Key of the sentinel that replaces a removed sensor in a command
pub const PLACEHOLDER_KEY: &str = "_";

/// Events broadcast by sensors
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    /// A scalar sensor was updated (possibly to no value)
    Updated {
        /// Sensor key
        key: String,
        /// New value
        value: Option<SensorValue>,
    },
    /// A dynamic sensor finished reconciling its children
    Reconciled {
        /// Dynamic sensor key
        key: String,
        /// Keys of the current children, in order
        children: Vec<String>,
    },
    /// A dynamic sensor created a child for a new id
    ChildAdded {
        /// Dynamic sensor key
        parent: String,
        /// Child sensor key
        child: String,
    },
    /// A dynamic sensor dropped a child whose id disappeared
    ChildRemoved {
        /// Dynamic sensor key
        parent: String,
        /// Child sensor key
        child: String,
    },
}

/// Turns a display name into a stable key
///
/// Lowercases ASCII letters, keeps alphanumerics and collapses every other
/// run of characters into a single `_`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    key
}

/// Static definition of a sensor
#[derive(Clone)]
pub struct SensorSpec {
    /// Display name
    pub name: String,
    /// Stable identifier
    pub key: String,
    /// Declared value type
    pub value_type: ValueType,
    /// Unit of measurement
    pub unit: Option<String>,
    /// Lower bound (value for numbers, length for strings)
    pub min: Option<f64>,
    /// Upper bound (value for numbers, length for strings)
    pub max: Option<f64>,
    /// Pattern string values must match
    pub pattern: Option<Regex>,
    /// Transform applied to the raw string before coercion
    pub renderer: Option<Renderer>,
    /// Command that sets an arbitrary value
    pub command_set: Option<Arc<Command>>,
    /// Command that switches a boolean sensor on
    pub command_on: Option<Arc<Command>>,
    /// Command that switches a boolean sensor off
    pub command_off: Option<Arc<Command>>,
    /// Output mapped to `true`
    pub payload_on: Option<String>,
    /// Output mapped to `false`
    pub payload_off: Option<String>,
}

impl SensorSpec {
    /// Creates a spec whose key is derived from the name
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            key: slugify(&name),
            name,
            value_type,
            unit: None,
            min: None,
            max: None,
            pattern: None,
            renderer: None,
            command_set: None,
            command_on: None,
            command_off: None,
            payload_on: None,
            payload_off: None,
        }
    }

    /// Sets an explicit key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the unit of measurement
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the lower bound
    #[must_use]
    pub const fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the upper bound
    #[must_use]
    pub const fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the pattern string values must match
    #[must_use]
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Sets the raw-output renderer
    #[must_use]
    pub fn with_renderer(
        mut self,
        renderer: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Sets the command used to assign a value
    #[must_use]
    pub fn with_command_set(mut self, command: Command) -> Self {
        self.command_set = Some(Arc::new(command));
        self
    }

    /// Sets the on/off commands of a boolean sensor
    #[must_use]
    pub fn with_switch(mut self, on: Command, off: Command) -> Self {
        self.command_on = Some(Arc::new(on));
        self.command_off = Some(Arc::new(off));
        self
    }

    /// Sets the string mapped to `true`
    #[must_use]
    pub fn with_payload_on(mut self, payload: impl Into<String>) -> Self {
        self.payload_on = Some(payload.into());
        self
    }

    /// Sets the string mapped to `false`
    #[must_use]
    pub fn with_payload_off(mut self, payload: impl Into<String>) -> Self {
        self.payload_off = Some(payload.into());
        self
    }
}

impl fmt::Debug for SensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorSpec")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("value_type", &self.value_type)
            .field("unit", &self.unit)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("renderer", &self.renderer.is_some())
            .field("command_set", &self.command_set)
            .field("command_on", &self.command_on)
            .field("command_off", &self.command_off)
            .field("payload_on", &self.payload_on)
            .field("payload_off", &self.payload_off)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SensorState {
    value: Option<SensorValue>,
    last_known_value: Option<SensorValue>,
}

/// A named, typed value derived from command output
#[derive(Debug)]
pub struct Sensor {
    spec: SensorSpec,
    id: Option<String>,
    state: Mutex<SensorState>,
    events: broadcast::Sender<SensorEvent>,
}

impl Sensor {
    /// Creates a sensor with no value
    #[must_use]
    pub fn new(spec: SensorSpec) -> Self {
        Self::with_id(spec, None)
    }

    pub(crate) fn with_id(spec: SensorSpec, id: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            spec,
            id,
            state: Mutex::new(SensorState::default()),
            events,
        }
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Stable key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.spec.key
    }

    /// Id taken from the output line, for children of a dynamic sensor
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Static definition
    #[must_use]
    pub const fn spec(&self) -> &SensorSpec {
        &self.spec
    }

    /// Declared value type
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.spec.value_type
    }

    /// Unit of measurement
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.spec.unit.as_deref()
    }

    /// Current value, `None` until a successful update
    #[must_use]
    pub fn value(&self) -> Option<SensorValue> {
        self.lock_state().value.clone()
    }

    /// Last value that passed coercion and validation
    #[must_use]
    pub fn last_known_value(&self) -> Option<SensorValue> {
        self.lock_state().last_known_value.clone()
    }

    /// Subscribes to this sensor's events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SensorEvent> {
        self.events.subscribe()
    }

    /// True when the sensor has commands to change its value
    #[must_use]
    pub const fn is_controllable(&self) -> bool {
        let switchable = matches!(self.spec.value_type, ValueType::Bool)
            && self.spec.command_on.is_some()
            && self.spec.command_off.is_some();
        switchable || self.spec.command_set.is_some()
    }

    /// Updates the value from one line of raw command output.
    ///
    /// `None` clears the value. Otherwise the renderer, coercion and bound
    /// checks run in that order; any failure is logged and clears the value
    /// while `last_known_value` keeps the previous good value. Subscribers
    /// are notified after every call.
    pub fn update(&self, raw: Option<&str>) {
        let Some(raw) = raw else {
            self.store(None);
            return;
        };

        match self.parse(raw) {
            Ok(value) => self.store(Some(value)),
            Err(e) => {
                tracing::warn!(sensor = %self.spec.key, error = %e, "Discarding sensor value");
                self.store(None);
            }
        }
    }

    /// Checks a value against the declared type and bounds
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Validate`] naming the violated bound.
    pub fn validate(&self, value: &SensorValue) -> Result<(), SensorError> {
        let reject = |reason: String| SensorError::Validate {
            key: self.spec.key.clone(),
            value: value.to_string(),
            reason,
        };

        if value.value_type() != self.spec.value_type {
            return Err(reject(format!(
                "expected {}, got {}",
                self.spec.value_type,
                value.value_type()
            )));
        }

        match value {
            SensorValue::String(s) => {
                let len = s.chars().count() as f64;
                if let Some(min) = self.spec.min
                    && len < min
                {
                    return Err(reject(format!("shorter than {min} characters")));
                }
                if let Some(max) = self.spec.max
                    && len > max
                {
                    return Err(reject(format!("longer than {max} characters")));
                }
                if let Some(pattern) = &self.spec.pattern
                    && !pattern.is_match(s)
                {
                    return Err(reject(format!("does not match '{}'", pattern.as_str())));
                }
            }
            SensorValue::Int(_) | SensorValue::Float(_) => {
                let number = value.as_f64().unwrap_or_default();
                if let Some(min) = self.spec.min
                    && number < min
                {
                    return Err(reject(format!("below minimum {min}")));
                }
                if let Some(max) = self.spec.max
                    && number > max
                {
                    return Err(reject(format!("above maximum {max}")));
                }
            }
            SensorValue::Bool(_) => {}
        }
        Ok(())
    }

    /// Changes the value on the remote host through the linked command.
    ///
    /// Does nothing when the sensor is not controllable or already holds
    /// `value`. The command runs with `{value}` and, for dynamic children,
    /// `{id}` in its context. The sensor itself is not updated; the next
    /// poll reads the new state back.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidValue`] when `value` fails validation,
    /// or the command's format/execute error.
    pub async fn set(&self, manager: &Manager, value: SensorValue) -> Result<(), CommandError> {
        if !self.is_controllable() || self.value().as_ref() == Some(&value) {
            return Ok(());
        }
        self.validate(&value)?;

        let command = match (value.as_bool(), &self.spec.command_on, &self.spec.command_off) {
            (Some(true), Some(on), Some(_)) => Arc::clone(on),
            (Some(false), Some(_), Some(off)) => Arc::clone(off),
            _ => match &self.spec.command_set {
                Some(set) => Arc::clone(set),
                None => return Ok(()),
            },
        };

        let mut context = CommandContext::new();
        if let Some(id) = &self.id {
            context.insert("id".to_string(), id.clone());
        }
        context.insert("value".to_string(), value.to_string());

        command.execute(manager, context).await?;
        Ok(())
    }

    fn parse(&self, raw: &str) -> Result<SensorValue, SensorError> {
        let coerce_error = |raw: &str, reason: String| SensorError::Coerce {
            key: self.spec.key.clone(),
            raw: raw.to_string(),
            value_type: self.spec.value_type,
            reason,
        };

        let rendered = match &self.spec.renderer {
            Some(renderer) => {
                renderer(raw).map_err(|e| coerce_error(raw, format!("renderer failed: {e}")))?
            }
            None => raw.to_string(),
        };

        let payloads = BoolPayloads {
            on: self.spec.payload_on.as_deref(),
            off: self.spec.payload_off.as_deref(),
        };
        let value = self
            .spec
            .value_type
            .coerce(&rendered, payloads)
            .map_err(|reason| coerce_error(&rendered, reason))?;

        self.validate(&value)?;
        Ok(value)
    }

    fn store(&self, value: Option<SensorValue>) {
        {
            let mut state = self.lock_state();
            if value.is_some() {
                state.last_known_value.clone_from(&value);
            }
            state.value.clone_from(&value);
        }
        let _ = self.events.send(SensorEvent::Updated {
            key: self.spec.key.clone(),
            value,
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SensorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_sensor() -> Sensor {
        Sensor::new(
            SensorSpec::new("CPU Load", ValueType::Int)
                .with_min(0.0)
                .with_max(100.0),
        )
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Free Disk Space"), "free_disk_space");
        assert_eq!(slugify("MAC Address"), "mac_address");
        assert_eq!(slugify("  OS -- Name "), "os_name");
        assert_eq!(slugify("/dev/sda1"), "dev_sda1");
    }

    #[test]
    fn test_key_derived_from_name() {
        let sensor = int_sensor();
        assert_eq!(sensor.key(), "cpu_load");
        assert_eq!(sensor.name(), "CPU Load");
    }

    #[test]
    fn test_update_sets_value_and_last_known() {
        let sensor = int_sensor();
        sensor.update(Some("42"));
        assert_eq!(sensor.value(), Some(SensorValue::Int(42)));
        assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(42)));
    }

    #[test]
    fn test_out_of_bounds_keeps_last_known() {
        let sensor = int_sensor();
        sensor.update(Some("42"));
        sensor.update(Some("420"));
        assert_eq!(sensor.value(), None);
        assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(42)));
    }

    #[test]
    fn test_coercion_failure_keeps_last_known() {
        let sensor = int_sensor();
        sensor.update(Some("7"));
        sensor.update(Some("n/a"));
        assert_eq!(sensor.value(), None);
        assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(7)));
    }

    #[test]
    fn test_update_none_clears_value() {
        let sensor = int_sensor();
        sensor.update(Some("7"));
        sensor.update(None);
        assert_eq!(sensor.value(), None);
        assert_eq!(sensor.last_known_value(), Some(SensorValue::Int(7)));
    }

    #[test]
    fn test_string_bounds_and_pattern() {
        let sensor = Sensor::new(
            SensorSpec::new("Hostname", ValueType::String)
                .with_min(1.0)
                .with_max(8.0)
                .with_pattern(Regex::new("^[a-z0-9-]+$").unwrap()),
        );
        sensor.update(Some("nas-01"));
        assert_eq!(sensor.value(), Some("nas-01".into()));
        sensor.update(Some("much-too-long"));
        assert_eq!(sensor.value(), None);
        sensor.update(Some("UPPER"));
        assert_eq!(sensor.value(), None);
        sensor.update(Some(""));
        assert_eq!(sensor.value(), None);
        assert_eq!(sensor.last_known_value(), Some("nas-01".into()));
    }

    #[test]
    fn test_renderer_runs_before_coercion() {
        let sensor = Sensor::new(
            SensorSpec::new("Temperature", ValueType::Float).with_renderer(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map(|milli| (milli / 1000.0).to_string())
                    .map_err(|e| e.to_string())
            }),
        );
        sensor.update(Some("45500"));
        assert_eq!(sensor.value(), Some(SensorValue::Float(45.5)));
        sensor.update(Some("garbage"));
        assert_eq!(sensor.value(), None);
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let sensor = int_sensor();
        let err = sensor.validate(&SensorValue::from("ten")).unwrap_err();
        assert!(matches!(err, SensorError::Validate { .. }));
    }

    #[test]
    fn test_notifies_on_every_update() {
        let sensor = int_sensor();
        let mut events = sensor.subscribe();

        sensor.update(Some("1"));
        sensor.update(Some("bad"));
        sensor.update(None);

        let expected = [Some(SensorValue::Int(1)), None, None];
        for value in expected {
            assert_eq!(
                events.try_recv().unwrap(),
                SensorEvent::Updated {
                    key: "cpu_load".to_string(),
                    value,
                }
            );
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_is_controllable() {
        let plain = Sensor::new(SensorSpec::new("Uptime", ValueType::Int));
        assert!(!plain.is_controllable());

        let switch = Sensor::new(
            SensorSpec::new("Wake on LAN", ValueType::Bool)
                .with_switch(Command::new("wol on"), Command::new("wol off")),
        );
        assert!(switch.is_controllable());

        // on/off only count for booleans
        let not_bool = Sensor::new(
            SensorSpec::new("Mode", ValueType::String)
                .with_switch(Command::new("on"), Command::new("off")),
        );
        assert!(!not_bool.is_controllable());

        let settable = Sensor::new(
            SensorSpec::new("Volume", ValueType::Int).with_command_set(Command::new("vol {value}")),
        );
        assert!(settable.is_controllable());
    }
}
