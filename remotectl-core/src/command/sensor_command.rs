//! Commands whose output feeds sensors

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::{Command, CommandContext, CommandOutput};
use crate::error::CommandError;
use crate::manager::Manager;
use crate::sensor::{DynamicSensor, PLACEHOLDER_KEY, Sensor, SensorSpec};

/// One position in a sensor command's output mapping
#[derive(Debug, Clone)]
pub enum SensorSlot {
    /// A scalar sensor fed by one output line
    Scalar(Arc<Sensor>),
    /// A dynamic sensor; alone in a command it receives every line
    Dynamic(Arc<DynamicSensor>),
    /// A removed sensor; its output line is ignored
    Placeholder,
}

impl SensorSlot {
    /// Creates a scalar slot
    #[must_use]
    pub fn scalar(spec: SensorSpec) -> Self {
        Self::Scalar(Arc::new(Sensor::new(spec)))
    }

    /// Creates a dynamic slot
    #[must_use]
    pub fn dynamic(sensor: DynamicSensor) -> Self {
        Self::Dynamic(Arc::new(sensor))
    }

    /// Key of the sensor in this slot, `_` for placeholders
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Scalar(sensor) => sensor.key(),
            Self::Dynamic(sensor) => sensor.key(),
            Self::Placeholder => PLACEHOLDER_KEY,
        }
    }

    /// True for placeholders left by [`SensorCommand::remove_sensor`]
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }
}

/// A command whose stdout lines are parsed into sensors
///
/// Line N of stdout feeds sensor N. A command holding exactly one dynamic
/// sensor feeds it every line instead.
#[derive(Debug)]
pub struct SensorCommand {
    command: Command,
    sensors: Mutex<Vec<SensorSlot>>,
    interval: Option<Duration>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl SensorCommand {
    /// Creates a sensor command
    #[must_use]
    pub fn new(string: impl Into<String>, sensors: Vec<SensorSlot>) -> Self {
        Self {
            command: Command::new(string),
            sensors: Mutex::new(sensors),
            interval: None,
            last_update: Mutex::new(None),
        }
    }

    /// Sets the minimum time between refreshes
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Overrides the manager's default timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command = self.command.with_timeout(timeout);
        self
    }

    /// Sets a transform applied to the formatted string
    #[must_use]
    pub fn with_renderer(
        mut self,
        renderer: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.command = self.command.with_renderer(renderer);
        self
    }

    /// The underlying command template
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Refresh interval
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Time of the last execution that exited with status 0
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The output mapping, placeholders included
    #[must_use]
    pub fn sensors(&self) -> Vec<SensorSlot> {
        self.lock_sensors().clone()
    }

    /// Scalar sensors fed by this command, dynamic children included
    #[must_use]
    pub fn scalar_sensors(&self) -> Vec<Arc<Sensor>> {
        let mut sensors = Vec::new();
        for slot in self.lock_sensors().iter() {
            match slot {
                SensorSlot::Scalar(sensor) => sensors.push(Arc::clone(sensor)),
                SensorSlot::Dynamic(dynamic) => sensors.extend(dynamic.children()),
                SensorSlot::Placeholder => {}
            }
        }
        sensors
    }

    /// Dynamic sensors fed by this command
    #[must_use]
    pub fn dynamic_sensors(&self) -> Vec<Arc<DynamicSensor>> {
        self.lock_sensors()
            .iter()
            .filter_map(|slot| match slot {
                SensorSlot::Dynamic(dynamic) => Some(Arc::clone(dynamic)),
                _ => None,
            })
            .collect()
    }

    /// True when this command feeds the sensor (or dynamic child) `key`
    #[must_use]
    pub fn owns(&self, key: &str) -> bool {
        self.lock_sensors().iter().any(|slot| match slot {
            SensorSlot::Scalar(sensor) => sensor.key() == key,
            SensorSlot::Dynamic(dynamic) => {
                dynamic.key() == key || dynamic.children().iter().any(|c| c.key() == key)
            }
            SensorSlot::Placeholder => false,
        })
    }

    /// True when the command has never succeeded or its interval elapsed
    #[must_use]
    pub fn needs_update(&self) -> bool {
        let Some(last_update) = self.last_update() else {
            return true;
        };
        let interval = self
            .interval
            .map_or(TimeDelta::zero(), |i| {
                TimeDelta::from_std(i).unwrap_or(TimeDelta::MAX)
            });
        Utc::now() - last_update >= interval
    }

    /// Feeds command output into the sensors.
    ///
    /// Output with exit code 0 advances `last_update` and maps stdout lines
    /// positionally; missing lines clear their sensor. `None` or a non-zero
    /// exit code clears every sensor.
    pub fn update_sensors(&self, output: Option<&CommandOutput>) {
        let data = match output {
            Some(output) if output.is_success() => {
                *self
                    .last_update
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(output.timestamp);
                Some(output.stdout.as_slice())
            }
            _ => None,
        };

        let sensors = self.sensors();
        if let [SensorSlot::Dynamic(dynamic)] = sensors.as_slice() {
            dynamic.update(data);
            return;
        }

        for (index, slot) in sensors.iter().enumerate() {
            let line = data.and_then(|lines| lines.get(index));
            match slot {
                SensorSlot::Scalar(sensor) => sensor.update(line.map(String::as_str)),
                SensorSlot::Dynamic(dynamic) => dynamic.update(line.map(std::slice::from_ref)),
                SensorSlot::Placeholder => {}
            }
        }
    }

    /// Runs the command and feeds its output into the sensors.
    ///
    /// On failure the sensors are cleared before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the command's format or execute error.
    pub async fn execute(
        &self,
        manager: &Manager,
        context: CommandContext,
    ) -> Result<CommandOutput, CommandError> {
        match self.command.execute(manager, context).await {
            Ok(output) => {
                self.update_sensors(Some(&output));
                Ok(output)
            }
            Err(e) => {
                self.update_sensors(None);
                Err(e)
            }
        }
    }

    /// Replaces the sensor `key` with a placeholder.
    ///
    /// The remaining sensors keep their positions. Returns false when no
    /// sensor has that key.
    pub fn remove_sensor(&self, key: &str) -> bool {
        let mut sensors = self.lock_sensors();
        match sensors
            .iter_mut()
            .find(|slot| !slot.is_placeholder() && slot.key() == key)
        {
            Some(slot) => {
                *slot = SensorSlot::Placeholder;
                true
            }
            None => false,
        }
    }

    fn lock_sensors(&self) -> MutexGuard<'_, Vec<SensorSlot>> {
        self.sensors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorValue, ValueType};

    fn three_sensor_command() -> SensorCommand {
        SensorCommand::new(
            "echo",
            vec![
                SensorSlot::scalar(SensorSpec::new("First", ValueType::Int)),
                SensorSlot::scalar(SensorSpec::new("Second", ValueType::Int)),
                SensorSlot::scalar(SensorSpec::new("Third", ValueType::Int)),
            ],
        )
    }

    fn values(command: &SensorCommand) -> Vec<Option<SensorValue>> {
        command.scalar_sensors().iter().map(|s| s.value()).collect()
    }

    #[test]
    fn test_positional_mapping_with_short_output() {
        let command = three_sensor_command();
        let output = CommandOutput::new(vec!["10".into(), "20".into()], Vec::new(), 0);
        command.update_sensors(Some(&output));

        assert_eq!(
            values(&command),
            vec![Some(SensorValue::Int(10)), Some(SensorValue::Int(20)), None]
        );
        assert_eq!(command.last_update(), Some(output.timestamp));
    }

    #[test]
    fn test_failed_exit_code_clears_sensors() {
        let command = three_sensor_command();
        let good = CommandOutput::new(vec!["1".into(), "2".into(), "3".into()], Vec::new(), 0);
        command.update_sensors(Some(&good));

        let failed = CommandOutput::new(vec!["4".into(), "5".into(), "6".into()], Vec::new(), 1);
        command.update_sensors(Some(&failed));

        assert_eq!(values(&command), vec![None, None, None]);
        assert_eq!(command.last_update(), Some(good.timestamp));
    }

    #[test]
    fn test_single_dynamic_sensor_gets_all_lines() {
        let command = SensorCommand::new(
            "df",
            vec![SensorSlot::dynamic(DynamicSensor::new(SensorSpec::new(
                "Disk",
                ValueType::Int,
            )))],
        );
        let output = CommandOutput::new(vec!["a|1".into(), "b|2".into()], Vec::new(), 0);
        command.update_sensors(Some(&output));

        let keys: Vec<_> = command
            .scalar_sensors()
            .iter()
            .map(|s| s.key().to_string())
            .collect();
        assert_eq!(keys, vec!["disk_a", "disk_b"]);
        assert!(command.owns("disk_b"));
        assert!(command.owns("disk"));
    }

    #[test]
    fn test_remove_sensor_keeps_positions() {
        let command = three_sensor_command();
        assert!(command.remove_sensor("second"));
        assert!(!command.remove_sensor("second"));

        let output = CommandOutput::new(
            vec!["10".into(), "20".into(), "30".into()],
            Vec::new(),
            0,
        );
        command.update_sensors(Some(&output));

        let slots = command.sensors();
        assert_eq!(slots.len(), 3);
        assert!(slots[1].is_placeholder());
        assert_eq!(slots[1].key(), "_");
        assert_eq!(
            values(&command),
            vec![Some(SensorValue::Int(10)), Some(SensorValue::Int(30))]
        );
        assert!(!command.owns("second"));
    }

    #[test]
    fn test_needs_update() {
        let command = three_sensor_command().with_interval(Duration::from_secs(3600));
        assert!(command.needs_update());

        command.update_sensors(Some(&CommandOutput::new(Vec::new(), Vec::new(), 0)));
        assert!(!command.needs_update());

        // Without an interval the command is stale again right away
        let no_interval = three_sensor_command();
        no_interval.update_sensors(Some(&CommandOutput::new(Vec::new(), Vec::new(), 0)));
        assert!(no_interval.needs_update());
    }
}
