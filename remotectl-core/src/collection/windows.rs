//! Windows profile, for OpenSSH servers whose default shell is `PowerShell`

use std::time::Duration;

use super::{Collection, action_key, sensor_key};
use crate::command::{ActionCommand, Command, SensorCommand, SensorSlot};
use crate::sensor::{DynamicSensor, SensorSpec, ValueType};

const MEMORY_INTERVAL: Duration = Duration::from_secs(30);
const DISK_INTERVAL: Duration = Duration::from_secs(60);
const LOAD_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the Windows `PowerShell` profile
///
/// Sensors are read through CIM queries.
#[must_use]
pub fn windows_powershell() -> Collection {
    Collection::new("windows_powershell")
        .with_action(
            ActionCommand::new("Turn off", "Stop-Computer -Force").with_key(action_key::TURN_OFF),
        )
        .with_action(
            ActionCommand::new("Restart", "Restart-Computer -Force").with_key(action_key::RESTART),
        )
        .with_sensor_command(SensorCommand::new(
            "(Get-NetRoute -DestinationPrefix '0.0.0.0/0' | Sort-Object RouteMetric | Select-Object -First 1).InterfaceAlias",
            vec![SensorSlot::scalar(
                SensorSpec::new("Interface", ValueType::String).with_key(sensor_key::INTERFACE),
            )],
        ))
        .with_sensor_command(SensorCommand::new(
            "(Get-NetAdapter -Name '{interface}').MacAddress",
            vec![SensorSlot::scalar(
                SensorSpec::new("MAC Address", ValueType::String)
                    .with_key(sensor_key::MAC_ADDRESS),
            )],
        ))
        .with_sensor_command(SensorCommand::new(
            "(Get-NetAdapterPowerManagement -Name '{interface}').WakeOnMagicPacket",
            vec![SensorSlot::scalar(
                SensorSpec::new("Wake on LAN", ValueType::Bool)
                    .with_key(sensor_key::WAKE_ON_LAN)
                    .with_payload_on("Enabled")
                    .with_payload_off("Disabled")
                    .with_switch(
                        Command::new(
                            "Set-NetAdapterPowerManagement -Name '{interface}' -WakeOnMagicPacket Enabled",
                        ),
                        Command::new(
                            "Set-NetAdapterPowerManagement -Name '{interface}' -WakeOnMagicPacket Disabled",
                        ),
                    ),
            )],
        ))
        .with_sensor_command(SensorCommand::new(
            "$os = Get-CimInstance Win32_OperatingSystem; \
             $cs = Get-CimInstance Win32_ComputerSystem; \
             $os.Caption; $os.Version; $os.BuildNumber; $env:COMPUTERNAME; \
             $env:PROCESSOR_ARCHITECTURE; $os.OSArchitecture; $cs.Model",
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
                SensorSlot::scalar(
                    SensorSpec::new("OS Architecture", ValueType::String)
                        .with_key(sensor_key::OS_ARCHITECTURE),
                ),
                SensorSlot::scalar(
                    SensorSpec::new("Device Name", ValueType::String)
                        .with_key(sensor_key::DEVICE_NAME),
                ),
            ],
        ))
        .with_sensor_command(
            SensorCommand::new(
                "$os = Get-CimInstance Win32_OperatingSystem; \
                 [math]::Round($os.TotalVisibleMemorySize / 1024); \
                 [math]::Round($os.FreePhysicalMemory / 1024)",
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
                "Get-CimInstance Win32_LogicalDisk -Filter 'DriveType=3' | \
                 ForEach-Object {{ \"$($_.DeviceID)|$([math]::Round($_.FreeSpace / 1MB))\" }}",
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
                "(Get-CimInstance Win32_Processor | Measure-Object -Property LoadPercentage -Average).Average",
                vec![SensorSlot::scalar(
                    SensorSpec::new("CPU Load", ValueType::Float)
                        .with_key(sensor_key::CPU_LOAD)
                        .with_unit("%")
                        .with_min(0.0)
                        .with_max(100.0),
                )],
            )
            .with_interval(LOAD_INTERVAL),
        )
        .with_sensor_command(
            SensorCommand::new(
                "(Get-CimInstance -Namespace root/wmi -ClassName MSAcpi_ThermalZoneTemperature | Select-Object -First 1).CurrentTemperature",
                vec![SensorSlot::scalar(
                    SensorSpec::new("Temperature", ValueType::Float)
                        .with_key(sensor_key::TEMPERATURE)
                        .with_unit("°C")
                        .with_renderer(decikelvin_to_celsius),
                )],
            )
            .with_interval(LOAD_INTERVAL),
        )
}

/// ACPI thermal zones report tenths of a kelvin
fn decikelvin_to_celsius(raw: &str) -> Result<String, String> {
    let decikelvin: f64 = raw.trim().parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    let celsius = decikelvin.mul_add(0.1, -273.15);
    Ok(format!("{celsius:.2}"))
}
