//! Health-check, power and execution behavior of a complete remote

use std::time::Duration;

use remotectl_core::collection::{action_key, sensor_key};
use remotectl_core::command::{ActionCommand, CommandContext};
use remotectl_core::testing::MockSession;
use remotectl_core::{
    Collection, CommandError, ConnectError, MacAddress, Remote, RemoteError, RemoteSettings,
    SensorValue, StateField,
};

use super::{Harness, linux_session};

fn refused() -> ConnectError {
    ConnectError::Connect {
        host: "nas.local".to_string(),
        reason: "Connection refused".to_string(),
    }
}

#[tokio::test]
async fn test_offline_host_is_not_contacted() {
    let harness = Harness::linux(linux_session());
    harness.pinger.set_alive(false);

    harness.remote.update_state(false).await.unwrap();

    assert!(!harness.remote.state().is_online());
    assert!(!harness.remote.state().is_connected());
    assert_eq!(harness.pinger.calls(), 1);
    assert_eq!(harness.session.connect_count(), 0);

    let err = harness.remote.update_state(true).await.unwrap_err();
    assert!(matches!(err, RemoteError::Offline(host) if host == "nas.local"));
}

#[tokio::test]
async fn test_reachable_host_connects_and_polls_every_sensor_command() {
    let harness = Harness::linux(linux_session());
    let mut events = harness.remote.state().subscribe();

    harness.remote.update_state(true).await.unwrap();

    let state = harness.remote.state();
    assert!(state.is_online());
    assert!(state.is_connected());
    assert_eq!(events.try_recv().unwrap().field, StateField::Online);
    assert_eq!(events.try_recv().unwrap().field, StateField::Connected);
    assert!(events.try_recv().is_err());

    for command in harness.remote.manager().collection().sensor_commands() {
        assert!(
            command.last_update().is_some(),
            "{} never ran",
            command.command().string()
        );
    }

    let manager = harness.remote.manager();
    assert_eq!(harness.remote.hostname().as_deref(), Some("nas"));
    assert_eq!(harness.remote.os_name().as_deref(), Some("Debian GNU/Linux"));
    assert_eq!(harness.remote.os_version().as_deref(), Some("12"));
    assert_eq!(
        manager.get_sensor(sensor_key::FREE_MEMORY).unwrap().value(),
        Some(SensorValue::Int(5120))
    );
    assert_eq!(
        manager.get_sensor(sensor_key::WAKE_ON_LAN).unwrap().value(),
        Some(SensorValue::Bool(true))
    );
    assert_eq!(
        manager.get_sensor("free_disk_space_srv_data").unwrap().value(),
        Some(SensorValue::Int(512_000))
    );
    let temperature = manager
        .get_sensor(sensor_key::TEMPERATURE)
        .unwrap()
        .value()
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!((temperature - 45.5).abs() < 1e-9);
    assert_eq!(
        harness.remote.mac_address(),
        Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
    );
}

#[tokio::test]
async fn test_healthy_session_skips_ping() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    let executed = harness.session.executed().len();

    harness.remote.update_state(true).await.unwrap();

    assert_eq!(harness.pinger.calls(), 0);
    assert_eq!(harness.session.connect_count(), 1);
    assert_eq!(harness.session.executed().len(), executed + 1);
    assert_eq!(harness.session.executed().last().map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_broken_session_reconnects_on_next_tick() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    harness.session.fail_next_exec();

    harness.remote.update_state(true).await.unwrap();

    assert_eq!(harness.pinger.calls(), 1);
    assert_eq!(harness.session.connect_count(), 2);
    assert_eq!(harness.session.close_count(), 1);
    assert!(harness.remote.state().is_connected());
}

#[tokio::test]
async fn test_transport_error_disconnects_and_clears_sensors() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    let load = harness.remote.manager().get_sensor(sensor_key::CPU_LOAD).unwrap();
    assert_eq!(load.value(), Some(SensorValue::Float(0.42)));

    harness.session.set_fail_exec(true);
    let err = harness
        .remote
        .execute_command_string("uptime", None)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Command(CommandError::Execute(_))));
    assert!(!harness.remote.state().is_connected());
    assert_eq!(load.value(), None);
    assert_eq!(load.last_known_value(), Some(SensorValue::Float(0.42)));

    let err = harness
        .remote
        .execute_command_string("uptime", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Command(CommandError::Execute(msg)) if msg == "Not connected"
    ));
}

#[tokio::test]
async fn test_disconnect_keeps_dynamic_children() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    let disks = harness
        .remote
        .manager()
        .get_dynamic_sensor(sensor_key::FREE_DISK_SPACE)
        .unwrap();
    assert_eq!(disks.children().len(), 2);

    harness.remote.disconnect().await;
    harness.remote.disconnect().await;

    assert_eq!(harness.session.close_count(), 1);
    assert_eq!(disks.children().len(), 2);
    assert!(disks.children().iter().all(|child| child.value().is_none()));
}

#[tokio::test]
async fn test_connect_error_respects_raise_errors() {
    let harness = Harness::linux(linux_session().with_connect_error(refused()));

    harness.remote.update_state(false).await.unwrap();
    assert!(harness.remote.state().is_online());
    assert!(!harness.remote.state().is_connected());

    let err = harness.remote.update_state(true).await.unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Connect(ConnectError::Connect { .. })
    ));
}

#[tokio::test]
async fn test_auth_and_host_key_errors_always_propagate() {
    let auth = ConnectError::Auth {
        host: "nas.local".to_string(),
        user: "root".to_string(),
        reason: "Authentication failed (password)".to_string(),
    };
    let harness = Harness::linux(linux_session().with_connect_error(auth.clone()));
    let err = harness.remote.update_state(false).await.unwrap_err();
    assert!(matches!(err, RemoteError::Connect(e) if e == auth));

    let unknown = ConnectError::HostKeyUnknown {
        host: "nas.local".to_string(),
        fingerprint: "ab:cd".to_string(),
    };
    harness.session.set_connect_error(Some(unknown.clone()));
    let err = harness.remote.update_state(false).await.unwrap_err();
    assert!(matches!(err, RemoteError::Connect(e) if e == unknown));
    assert!(!harness.remote.state().is_connected());
}

#[tokio::test]
async fn test_turn_on_needs_a_mac_address() {
    let harness = Harness::linux(linux_session());

    let err = harness.remote.turn_on().await.unwrap_err();
    assert!(matches!(err, RemoteError::MacAddressUnavailable(_)));
    assert!(harness.wol.sent().is_empty());
}

#[tokio::test]
async fn test_turn_on_sends_configured_mac_once() {
    let mac = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let harness = Harness::from_builder(
        Remote::builder("pc.local").mac_address(mac),
        MockSession::new(),
    );

    harness.remote.turn_on().await.unwrap();

    assert_eq!(harness.wol.sent(), vec![mac]);
    assert!(!harness.remote.state().is_online());
    assert_eq!(harness.pinger.calls(), 0);
}

#[tokio::test]
async fn test_turn_on_uses_last_known_mac_sensor_value() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    harness.remote.disconnect().await;
    harness.pinger.set_alive(false);
    harness.remote.update_state(false).await.unwrap();
    assert!(!harness.remote.state().is_online());

    harness.remote.turn_on().await.unwrap();
    assert_eq!(
        harness.wol.sent(),
        vec![MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])]
    );
}

#[tokio::test]
async fn test_turn_on_is_noop_when_online() {
    let harness = Harness::linux(linux_session());
    harness.remote.update_state(true).await.unwrap();

    harness.remote.turn_on().await.unwrap();
    assert!(harness.wol.sent().is_empty());
}

#[tokio::test]
async fn test_turn_off_requires_permission() {
    let harness = Harness::linux(linux_session());
    harness.remote.connect().await.unwrap();
    harness.remote.turn_off().await.unwrap();
    assert_eq!(harness.session.executed_count("shutdown -h now"), 0);

    let harness = Harness::new(
        remotectl_core::linux(),
        linux_session(),
        RemoteSettings::default().with_allow_turn_off(true),
    );
    harness.remote.connect().await.unwrap();
    harness.remote.turn_off().await.unwrap();
    assert_eq!(harness.session.executed_count("shutdown -h now"), 1);
}

#[tokio::test]
async fn test_run_action_errors() {
    let collection = Collection::new("custom")
        .with_action(ActionCommand::new("Greet", "echo {greeting}"))
        .with_action(ActionCommand::new("Restart", "reboot").with_key(action_key::RESTART));
    let harness = Harness::new(collection, MockSession::new(), RemoteSettings::default());
    harness.remote.connect().await.unwrap();

    let err = harness
        .remote
        .run_action("greet", CommandContext::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Command(CommandError::Format(ref msg)) if msg.contains("greeting")
    ));

    let err = harness
        .remote
        .run_action("fly", CommandContext::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Command(CommandError::UnknownCommand(key)) if key == "fly"
    ));

    let context = CommandContext::from([("greeting".to_string(), "hi".to_string())]);
    harness.remote.run_action("greet", context).await.unwrap();
    harness
        .remote
        .run_action(action_key::RESTART, CommandContext::new())
        .await
        .unwrap();
    assert_eq!(harness.session.executed(), vec!["echo hi", "reboot"]);
}

#[tokio::test]
async fn test_slow_command_times_out_and_disconnects() {
    let session = MockSession::new().with_exec_delay(Duration::from_millis(100));
    let harness = Harness::new(
        Collection::new("empty"),
        session,
        RemoteSettings::default().with_command_timeout(Duration::from_millis(10)),
    );
    harness.remote.connect().await.unwrap();

    let err = harness
        .remote
        .execute_command_string("sleep 5", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RemoteError::Command(CommandError::Timeout(t)) if t == Duration::from_millis(10)
    ));
    assert!(!harness.remote.state().is_connected());
}
