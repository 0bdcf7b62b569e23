mod collection_tests;
mod remote_tests;

use std::sync::Arc;

use remotectl_core::testing::{MockPinger, MockSession, RecordingWakeOnLan};
use remotectl_core::{Collection, Remote, RemoteBuilder, RemoteSettings};

/// A remote wired to in-memory capabilities
pub struct Harness {
    pub remote: Remote,
    pub session: MockSession,
    pub pinger: MockPinger,
    pub wol: RecordingWakeOnLan,
}

impl Harness {
    /// Finishes `builder` with fresh doubles around `session`
    pub fn from_builder(builder: RemoteBuilder, session: MockSession) -> Self {
        let pinger = MockPinger::new(true);
        let wol = RecordingWakeOnLan::new();
        let remote = builder
            .session(Box::new(session.clone()))
            .pinger(Arc::new(pinger.clone()))
            .wake_on_lan(Arc::new(wol.clone()))
            .build();
        Self {
            remote,
            session,
            pinger,
            wol,
        }
    }

    pub fn new(collection: Collection, session: MockSession, settings: RemoteSettings) -> Self {
        Self::from_builder(
            Remote::builder("nas.local")
                .name("NAS")
                .collection(collection)
                .settings(settings),
            session,
        )
    }

    pub fn linux(session: MockSession) -> Self {
        Self::new(remotectl_core::linux(), session, RemoteSettings::default())
    }
}

/// Session answering the Linux profile's commands like a small NAS
pub fn linux_session() -> MockSession {
    MockSession::new()
        .with_response_containing("ip route show default", &["eth0"], 0)
        .with_response("cat /sys/class/net/eth0/address", &["aa:bb:cc:dd:ee:ff"], 0)
        .with_response("cat /sys/class/net/eth0/device/power/wakeup", &["enabled"], 0)
        .with_response_containing(
            "/etc/os-release",
            &["Debian GNU/Linux", "12", "6.1.0-18-amd64", "nas", "x86_64"],
            0,
        )
        .with_response_containing("free -m", &["7936", "5120"], 0)
        .with_response_containing("df -m", &["/|10240", "/srv/data|512000"], 0)
        .with_response("cut -d ' ' -f 1 /proc/loadavg", &["0.42"], 0)
        .with_response("cat /sys/class/thermal/thermal_zone0/temp", &["45500"], 0)
}
