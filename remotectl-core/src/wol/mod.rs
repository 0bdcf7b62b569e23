//! Wake-on-LAN
//!
//! Powering a remote on means broadcasting one magic packet for its MAC
//! address. Delivery is not confirmed; the next health-check tick tells
//! whether the host came up.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::UdpSocket;

/// Errors related to Wake-on-LAN
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WolError {
    /// The string is not six separated octets
    #[error("Invalid MAC address format: {0}")]
    InvalidMacFormat(String),

    /// An octet is not two hex digits
    #[error("Invalid MAC address byte: {0}")]
    InvalidMacByte(String),

    /// The UDP socket could not be created or configured
    #[error("Failed to create UDP socket: {0}")]
    Socket(String),

    /// The packet could not be sent
    #[error("Failed to send magic packet: {0}")]
    Send(String),
}

/// Result type alias for WOL operations
pub type WolResult<T> = std::result::Result<T, WolError>;

/// A 6-byte hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates a `MacAddress` from raw bytes
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[must_use]
    pub const fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Parses `AA:BB:CC:DD:EE:FF` or `AA-BB-CC-DD-EE-FF`
    ///
    /// Windows reports dashes, Linux colons; both are accepted.
    ///
    /// # Errors
    ///
    /// Returns `WolError::InvalidMacFormat` if the format is invalid or
    /// `WolError::InvalidMacByte` if an octet is not hexadecimal.
    ///
    /// # Examples
    /// ```
    /// use remotectl_core::wol::MacAddress;
    ///
    /// let linux = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
    /// let windows = MacAddress::parse("AA-BB-CC-DD-EE-FF").unwrap();
    /// assert_eq!(linux, windows);
    /// ```
    pub fn parse(input: &str) -> WolResult<Self> {
        input.parse()
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let separator = if trimmed.contains(':') {
            ':'
        } else if trimmed.contains('-') {
            '-'
        } else {
            return Err(WolError::InvalidMacFormat(format!(
                "'{trimmed}' has no ':' or '-' separators"
            )));
        };

        let parts: Vec<&str> = trimmed.split(separator).collect();
        if parts.len() != 6 {
            return Err(WolError::InvalidMacFormat(format!(
                "'{trimmed}' has {} octets, expected 6",
                parts.len()
            )));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(WolError::InvalidMacFormat(format!(
                    "octet '{part}' is not 2 hex digits"
                )));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| WolError::InvalidMacByte(format!("'{part}'")))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddress {
    type Error = WolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Default WOL port (discard protocol)
pub const DEFAULT_WOL_PORT: u16 = 9;

/// Magic packet size: 6 bytes of 0xFF + 16 repetitions of the MAC address
pub const MAGIC_PACKET_SIZE: usize = 6 + (16 * 6);

/// Builds the magic packet for `mac`
#[must_use]
pub fn generate_magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_SIZE] {
    let mut packet = [0xFF; MAGIC_PACKET_SIZE];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(mac.bytes());
    }
    packet
}

/// Sends magic packets
#[async_trait]
pub trait WakeOnLan: Send + Sync {
    /// Sends one magic packet for `mac`
    ///
    /// # Errors
    ///
    /// Returns [`WolError::Socket`] or [`WolError::Send`].
    async fn send_magic_packet(&self, mac: &MacAddress) -> WolResult<()>;
}

/// [`WakeOnLan`] over UDP broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpWakeOnLan {
    broadcast: Ipv4Addr,
    port: u16,
}

impl Default for UdpWakeOnLan {
    fn default() -> Self {
        Self {
            broadcast: Ipv4Addr::BROADCAST,
            port: DEFAULT_WOL_PORT,
        }
    }
}

impl UdpWakeOnLan {
    /// Broadcasts to `255.255.255.255:9`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the broadcast address, e.g. a subnet's directed broadcast
    #[must_use]
    pub const fn with_broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Sets the UDP port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[async_trait]
impl WakeOnLan for UdpWakeOnLan {
    async fn send_magic_packet(&self, mac: &MacAddress) -> WolResult<()> {
        let packet = generate_magic_packet(mac);
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| WolError::Socket(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| WolError::Socket(e.to_string()))?;
        socket
            .send_to(&packet, (self.broadcast, self.port))
            .await
            .map_err(|e| WolError::Send(e.to_string()))?;

        tracing::debug!(%mac, broadcast = %self.broadcast, port = self.port, "Sent magic packet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators_and_case() {
        let expected = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        for input in ["AA:BB:CC:DD:EE:FF", "aa-bb-cc-dd-ee-ff", " aa:bb:cc:dd:ee:ff\n"] {
            assert_eq!(MacAddress::parse(input).unwrap().bytes(), &expected);
        }
    }

    #[test]
    fn test_parse_invalid() {
        for input in [
            "AABBCCDDEEFF",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "A:BB:CC:DD:EE:FF",
        ] {
            assert!(matches!(
                MacAddress::parse(input),
                Err(WolError::InvalidMacFormat(_))
            ));
        }
        assert!(matches!(
            MacAddress::parse("GG:HH:II:JJ:KK:LL"),
            Err(WolError::InvalidMacByte(_))
        ));
    }

    #[test]
    fn test_display() {
        let mac = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(mac.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn test_magic_packet_format() {
        let mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let packet = generate_magic_packet(&mac);

        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|&b| b == 0xFF));
        for chunk in packet[6..].chunks_exact(6) {
            assert_eq!(chunk, mac.bytes());
        }
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Host {
            mac: MacAddress,
        }

        let host: Host = toml::from_str("mac = \"aa-bb-cc-dd-ee-ff\"").unwrap();
        assert_eq!(host.mac, MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert!(toml::from_str::<Host>("mac = \"nope\"").is_err());
    }

    #[tokio::test]
    async fn test_udp_sender_delivers_packet() {
        let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let sender = UdpWakeOnLan::new()
            .with_broadcast(Ipv4Addr::LOCALHOST)
            .with_port(port);

        let mac = MacAddress::new([1, 2, 3, 4, 5, 6]);
        sender.send_magic_packet(&mac).await.unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &generate_magic_packet(&mac)[..]);
    }
}
