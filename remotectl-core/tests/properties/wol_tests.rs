//! Property-based tests for MAC address parsing and magic packets

use proptest::prelude::*;
use remotectl_core::wol::{MAGIC_PACKET_SIZE, MacAddress, generate_magic_packet};

fn arb_mac_bytes() -> impl Strategy<Value = [u8; 6]> {
    prop::array::uniform6(any::<u8>())
}

/// MAC strings as Linux (lowercase, colons) and Windows (uppercase, dashes)
/// report them
fn arb_reported_mac() -> impl Strategy<Value = ([u8; 6], String)> {
    (arb_mac_bytes(), any::<bool>()).prop_map(|(bytes, windows)| {
        let octets: Vec<String> = bytes
            .iter()
            .map(|b| {
                if windows {
                    format!("{b:02X}")
                } else {
                    format!("{b:02x}")
                }
            })
            .collect();
        let text = octets.join(if windows { "-" } else { ":" });
        (bytes, text)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn reported_mac_parses_to_its_bytes((bytes, text) in arb_reported_mac()) {
        let mac = MacAddress::parse(&text).unwrap();
        prop_assert_eq!(mac.bytes(), &bytes);
        prop_assert_eq!(MacAddress::parse(&mac.to_string()).unwrap(), mac);
    }

    #[test]
    fn magic_packet_repeats_mac(bytes in arb_mac_bytes()) {
        let mac = MacAddress::new(bytes);
        let packet = generate_magic_packet(&mac);

        prop_assert_eq!(packet.len(), MAGIC_PACKET_SIZE);
        prop_assert!(packet[..6].iter().all(|&b| b == 0xFF));
        for chunk in packet[6..].chunks_exact(6) {
            prop_assert_eq!(chunk, &bytes[..]);
        }
    }

    #[test]
    fn strings_without_six_octets_are_rejected(count in (1usize..12).prop_filter("not six", |n| *n != 6)) {
        let text = vec!["ab"; count].join(":");
        prop_assert!(MacAddress::parse(&text).is_err());
    }
}
