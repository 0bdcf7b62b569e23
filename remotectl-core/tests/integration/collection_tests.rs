//! The Linux and Windows profiles against scripted hosts

use remotectl_core::collection::{action_key, sensor_key};
use remotectl_core::command::CommandContext;
use remotectl_core::sensor::SensorEvent;
use remotectl_core::testing::MockSession;
use remotectl_core::{MacAddress, RemoteSettings, SensorValue};

use super::{Harness, linux_session};

fn windows_session() -> MockSession {
    MockSession::new()
        .with_response_containing("Get-NetRoute", &["Ethernet"], 0)
        .with_response(
            "(Get-NetAdapter -Name 'Ethernet').MacAddress",
            &["AA-BB-CC-DD-EE-01"],
            0,
        )
        .with_response(
            "(Get-NetAdapterPowerManagement -Name 'Ethernet').WakeOnMagicPacket",
            &["Enabled"],
            0,
        )
        .with_response_containing(
            "Win32_ComputerSystem",
            &[
                "Microsoft Windows 11 Pro",
                "10.0.22631",
                "22631",
                "GAMING-PC",
                "AMD64",
                "64-bit",
                "B650 AORUS ELITE",
            ],
            0,
        )
        .with_response_containing("TotalVisibleMemorySize", &["32768", "20480"], 0)
        .with_response_containing("Win32_LogicalDisk", &["C:|102400", "D:|819200"], 0)
        .with_response_containing("LoadPercentage", &["12"], 0)
        .with_response_containing("MSAcpi_ThermalZoneTemperature", &["3232"], 0)
}

#[tokio::test]
async fn test_windows_profile() {
    let harness = Harness::new(
        remotectl_core::windows_powershell(),
        windows_session(),
        RemoteSettings::default()
            .with_username("Administrator")
            .with_allow_turn_off(true),
    );
    harness.remote.connect().await.unwrap();

    let manager = harness.remote.manager();
    assert_eq!(harness.remote.hostname().as_deref(), Some("GAMING-PC"));
    assert_eq!(
        manager.get_sensor(sensor_key::DEVICE_NAME).unwrap().value(),
        Some("B650 AORUS ELITE".into())
    );
    assert_eq!(
        manager.get_sensor("free_disk_space_c").unwrap().value(),
        Some(SensorValue::Int(102_400))
    );
    assert_eq!(
        manager.get_sensor(sensor_key::TEMPERATURE).unwrap().value(),
        Some(SensorValue::Float(50.05))
    );
    assert_eq!(
        harness.remote.mac_address(),
        Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01]))
    );

    harness.remote.turn_off().await.unwrap();
    assert_eq!(harness.session.executed_count("Stop-Computer -Force"), 1);
}

#[tokio::test]
async fn test_wake_on_lan_switch_formats_interface() {
    let harness = Harness::new(
        remotectl_core::windows_powershell(),
        windows_session(),
        RemoteSettings::default(),
    );
    harness.remote.connect().await.unwrap();

    let manager = harness.remote.manager();
    let wol = manager.get_sensor(sensor_key::WAKE_ON_LAN).unwrap();
    assert_eq!(wol.value(), Some(SensorValue::Bool(true)));
    assert!(wol.is_controllable());

    wol.set(manager, SensorValue::Bool(true)).await.unwrap();
    wol.set(manager, SensorValue::Bool(false)).await.unwrap();

    let executed = harness.session.executed();
    let switches: Vec<_> = executed
        .iter()
        .filter(|c| c.starts_with("Set-NetAdapterPowerManagement"))
        .collect();
    assert_eq!(
        switches,
        vec!["Set-NetAdapterPowerManagement -Name 'Ethernet' -WakeOnMagicPacket Disabled"]
    );
}

#[tokio::test]
async fn test_poll_skips_fresh_commands() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    let load_command = "cut -d ' ' -f 1 /proc/loadavg";
    assert_eq!(harness.session.executed_count(load_command), 1);

    let sensors = harness
        .remote
        .poll_sensors([sensor_key::CPU_LOAD], false)
        .await;
    assert_eq!(sensors.len(), 1);
    assert_eq!(harness.session.executed_count(load_command), 1);

    harness.session.respond(load_command, &["1.5"], 0);
    let sensors = harness
        .remote
        .poll_sensors([sensor_key::CPU_LOAD, sensor_key::TEMPERATURE], true)
        .await;
    assert_eq!(sensors.len(), 2);
    assert_eq!(harness.session.executed_count(load_command), 2);
    assert_eq!(sensors[0].value(), Some(SensorValue::Float(1.5)));
}

#[tokio::test]
async fn test_refresh_reconciles_disks() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    let disks = harness
        .remote
        .manager()
        .get_dynamic_sensor(sensor_key::FREE_DISK_SPACE)
        .unwrap();
    let mut events = disks.subscribe();

    harness
        .session
        .respond_containing("df -m", &["/|9000", "/mnt/usb|64000"], 0);
    harness.remote.refresh_sensors(true).await;

    let keys: Vec<_> = disks.children().iter().map(|c| c.key().to_string()).collect();
    assert_eq!(keys, vec!["free_disk_space_root", "free_disk_space_mnt_usb"]);
    assert!(harness
        .remote
        .manager()
        .get_sensor("free_disk_space_srv_data")
        .is_none());

    let mut added = Vec::new();
    let mut removed = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SensorEvent::ChildAdded { child, .. } => added.push(child),
            SensorEvent::ChildRemoved { child, .. } => removed.push(child),
            _ => {}
        }
    }
    assert_eq!(added, vec!["free_disk_space_mnt_usb"]);
    assert_eq!(removed, vec!["free_disk_space_srv_data"]);
}

#[tokio::test]
async fn test_failed_sensor_command_does_not_fail_connect() {
    let session = linux_session().with_response("cut -d ' ' -f 1 /proc/loadavg", &[], 1);
    let harness = Harness::linux(session);

    harness.remote.connect().await.unwrap();

    assert!(harness.remote.state().is_connected());
    let load = harness
        .remote
        .manager()
        .get_sensor(sensor_key::CPU_LOAD)
        .unwrap();
    assert_eq!(load.value(), None);
    assert_eq!(harness.remote.hostname().as_deref(), Some("nas"));
}

#[tokio::test]
async fn test_restart_action_on_both_profiles() {
    for (collection, expected) in [
        (remotectl_core::linux(), "shutdown -r now"),
        (
            remotectl_core::windows_powershell(),
            "Restart-Computer -Force",
        ),
    ] {
        let harness = Harness::new(collection, MockSession::new(), RemoteSettings::default());
        harness.remote.connect().await.unwrap();
        harness
            .remote
            .run_action(action_key::RESTART, CommandContext::new())
            .await
            .unwrap();
        assert_eq!(harness.session.executed_count(expected), 1);
    }
}
