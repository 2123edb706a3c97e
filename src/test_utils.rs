use crate::mac_address::MacAddress;
use crate::measurement::Measurement;
use crate::tpms::{PAYLOAD_LENGTH, SIGNATURE, identify};
use std::time::SystemTime;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Build a 23-byte TPMS payload with the given sub-identifier, raw
/// temperature byte and raw big-endian pressure bytes.
pub fn tpms_payload(sub_id: [u8; 2], temperature: u8, pressure: [u8; 2]) -> Vec<u8> {
    let mut payload = vec![0u8; PAYLOAD_LENGTH];
    payload[..2].copy_from_slice(&SIGNATURE);
    for (i, byte) in payload[2..18].iter_mut().enumerate() {
        *byte = 0x10 + i as u8;
    }
    payload[18..20].copy_from_slice(&sub_id);
    payload[20] = temperature;
    payload[21..23].copy_from_slice(&pressure);
    payload
}

/// Build a `Measurement` for sensor `tpms_86BC` with zeroed values.
///
/// Tests can override just the fields they care about.
pub fn base_measurement(mac: MacAddress, timestamp: SystemTime) -> Measurement {
    let payload = tpms_payload([0x86, 0xBC], 0xA8, [0x00, 0x00]);
    let (identity, _) = identify(&payload).expect("valid test payload");
    Measurement {
        identity,
        mac,
        timestamp,
        temperature: 0.0,
        pressure: 0.0,
    }
}
