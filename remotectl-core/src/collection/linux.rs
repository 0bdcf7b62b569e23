//! POSIX/Linux profile

use std::time::Duration;

use regex::Regex;

use super::{Collection, action_key, millidegrees_to_celsius, sensor_key};
use crate::command::{ActionCommand, Command, SensorCommand, SensorSlot};
use crate::sensor::{DynamicSensor, SensorSpec, ValueType};

const MEMORY_INTERVAL: Duration = Duration::from_secs(30);
const DISK_INTERVAL: Duration = Duration::from_secs(60);
const LOAD_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the Linux profile
///
/// Commands assume a POSIX shell, iproute2, procps `free` and GNU `df`.
#[must_use]
pub fn linux() -> Collection {
    Collection::new("linux")
        .with_action(ActionCommand::new("Turn off", "shutdown -h now").with_key(action_key::TURN_OFF))
        .with_action(ActionCommand::new("Restart", "shutdown -r now").with_key(action_key::RESTART))
        .with_sensor_command(SensorCommand::new(
            "ip route show default | awk '{{print $5; exit}}'",
            vec![SensorSlot::scalar(
                SensorSpec::new("Interface", ValueType::String).with_key(sensor_key::INTERFACE),
            )],
        ))
        .with_sensor_command(SensorCommand::new(
            "cat /sys/class/net/{interface}/address",
            vec![SensorSlot::scalar(mac_address_spec())],
        ))
        .with_sensor_command(SensorCommand::new(
            "cat /sys/class/net/{interface}/device/power/wakeup",
            vec![SensorSlot::scalar(
                SensorSpec::new("Wake on LAN", ValueType::Bool)
                    .with_key(sensor_key::WAKE_ON_LAN)
                    .with_switch(
                        Command::new("ethtool -s {interface} wol g"),
                        Command::new("ethtool -s {interface} wol d"),
                    ),
            )],
        ))
        .with_sensor_command(SensorCommand::new(
            ". /etc/os-release && echo \"$NAME\" && echo \"$VERSION_ID\" && uname -r && hostname && uname -m",
            vec![
                SensorSlot::scalar(
                    SensorSpec::new("OS Name", ValueType::String).with_key(sensor_key::OS_NAME),
                ),
                SensorSlot::scalar(
                    SensorSpec::new("OS Version", ValueType::String)
                        .with_key(sensor_key::OS_VERSION),
                ),
                SensorSlot::scalar(
                    SensorSpec::new("OS Release", ValueType::String)
                        .with_key(sensor_key::OS_RELEASE),
                ),
                SensorSlot::scalar(
                    SensorSpec::new("Hostname", ValueType::String).with_key(sensor_key::HOSTNAME),
                ),
                SensorSlot::scalar(
                    SensorSpec::new("Machine Type", ValueType::String)
                        .with_key(sensor_key::MACHINE_TYPE),
                ),
            ],
        ))
        .with_sensor_command(
            SensorCommand::new(
                "free -m | awk '/^Mem:/ {{print $2; print $7}}'",
                vec![
                    SensorSlot::scalar(
                        SensorSpec::new("Total Memory", ValueType::Int)
                            .with_key(sensor_key::TOTAL_MEMORY)
                            .with_unit("MB")
                            .with_min(0.0),
                    ),
                    SensorSlot::scalar(
                        SensorSpec::new("Free Memory", ValueType::Int)
                            .with_key(sensor_key::FREE_MEMORY)
                            .with_unit("MB")
                            .with_min(0.0),
                    ),
                ],
            )
            .with_interval(MEMORY_INTERVAL),
        )
        .with_sensor_command(
            SensorCommand::new(
                "df -m --output=target,avail -x tmpfs -x devtmpfs | tail -n +2 | awk '{{print $1 \"|\" $2}}'",
                vec![SensorSlot::dynamic(DynamicSensor::new(
                    SensorSpec::new("Free Disk Space", ValueType::Int)
                        .with_key(sensor_key::FREE_DISK_SPACE)
                        .with_unit("MB")
                        .with_min(0.0),
                ))],
            )
            .with_interval(DISK_INTERVAL),
        )
        .with_sensor_command(
            SensorCommand::new(
                "cut -d ' ' -f 1 /proc/loadavg",
                vec![SensorSlot::scalar(
                    SensorSpec::new("CPU Load", ValueType::Float)
                        .with_key(sensor_key::CPU_LOAD)
                        .with_min(0.0),
                )],
            )
            .with_interval(LOAD_INTERVAL),
        )
        .with_sensor_command(
            SensorCommand::new(
                "cat /sys/class/thermal/thermal_zone0/temp",
                vec![SensorSlot::scalar(
                    SensorSpec::new("Temperature", ValueType::Float)
                        .with_key(sensor_key::TEMPERATURE)
                        .with_unit("°C")
                        .with_renderer(millidegrees_to_celsius),
                )],
            )
            .with_interval(LOAD_INTERVAL),
        )
}

fn mac_address_spec() -> SensorSpec {
    let spec = SensorSpec::new("MAC Address", ValueType::String).with_key(sensor_key::MAC_ADDRESS);
    match Regex::new("^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$") {
        Ok(pattern) => spec.with_pattern(pattern),
        Err(_) => spec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::sensor::SensorValue;

    fn command_owning(collection: &Collection, key: &str) -> std::sync::Arc<SensorCommand> {
        collection
            .sensor_commands()
            .iter()
            .find(|c| c.owns(key))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_actions() {
        let collection = linux();
        assert_eq!(
            collection.action(action_key::TURN_OFF).unwrap().command().string(),
            "shutdown -h now"
        );
        assert_eq!(
            collection.action(action_key::RESTART).unwrap().command().string(),
            "shutdown -r now"
        );
    }

    #[test]
    fn test_mac_address_depends_on_interface() {
        let collection = linux();
        let command = command_owning(&collection, sensor_key::MAC_ADDRESS);
        assert_eq!(
            command.command().field_keys().unwrap(),
            vec![sensor_key::INTERFACE]
        );
    }

    #[test]
    fn test_os_info_output() {
        let collection = linux();
        let command = command_owning(&collection, sensor_key::HOSTNAME);
        let output = CommandOutput::new(
            ["Debian GNU/Linux", "12", "6.1.0-18-amd64", "nas", "x86_64"]
                .map(String::from)
                .to_vec(),
            Vec::new(),
            0,
        );
        command.update_sensors(Some(&output));

        let values: Vec<_> = command
            .scalar_sensors()
            .iter()
            .map(|s| (s.key().to_string(), s.value()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("os_name".to_string(), Some("Debian GNU/Linux".into())),
                ("os_version".to_string(), Some("12".into())),
                ("os_release".to_string(), Some("6.1.0-18-amd64".into())),
                ("hostname".to_string(), Some("nas".into())),
                ("machine_type".to_string(), Some("x86_64".into())),
            ]
        );
    }

    #[test]
    fn test_wake_on_lan_and_temperature_parsing() {
        let collection = linux();
        let wol = command_owning(&collection, sensor_key::WAKE_ON_LAN);
        wol.update_sensors(Some(&CommandOutput::new(vec!["enabled".into()], Vec::new(), 0)));
        assert_eq!(wol.scalar_sensors()[0].value(), Some(SensorValue::Bool(true)));
        assert!(wol.scalar_sensors()[0].is_controllable());

        let temperature = command_owning(&collection, sensor_key::TEMPERATURE);
        temperature.update_sensors(Some(&CommandOutput::new(vec!["51000".into()], Vec::new(), 0)));
        assert_eq!(
            temperature.scalar_sensors()[0].value(),
            Some(SensorValue::Float(51.0))
        );
    }

    #[test]
    fn test_mac_address_pattern() {
        let collection = linux();
        let command = command_owning(&collection, sensor_key::MAC_ADDRESS);
        command.update_sensors(Some(&CommandOutput::new(
            vec!["aa:bb:cc:dd:ee:ff".into()],
            Vec::new(),
            0,
        )));
        assert!(command.scalar_sensors()[0].value().is_some());

        command.update_sensors(Some(&CommandOutput::new(vec!["none".into()], Vec::new(), 0)));
        assert!(command.scalar_sensors()[0].value().is_none());
    }
}
