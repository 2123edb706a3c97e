//! TPMS beacon advertisement decoding.
//!
//! The supported sensors broadcast a fixed 23-byte manufacturer data payload
//! shaped like an iBeacon frame:
//!
//! | Offset | Size | Field                                        |
//! |--------|------|----------------------------------------------|
//! | 0      | 2    | Signature `02 15`                            |
//! | 2      | 16   | Vendor bytes (ignored)                       |
//! | 18     | 2    | Sensor sub-identifier                        |
//! | 20     | 1    | Temperature in °C, biased by +168            |
//! | 21     | 2    | Pressure in 1/10000 bar, big-endian          |
//!
//! Everything here is a pure function of the advertisement bytes. The radio
//! address is carried along for reporting but never feeds into the sensor
//! identity: the same payload yields the same identity whichever address
//! carried it.

use crate::mac_address::MacAddress;
use crate::measurement::Measurement;
use crate::reading::{DecodedReading, ReadingSink};
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Manufacturer ID the sensors advertise under by default.
///
/// This is Apple's company identifier, not the sensor vendor's. Other
/// firmware revisions have been seen advertising under 0x0100.
pub const DEFAULT_MANUFACTURER_ID: u16 = 0x004C;

/// Exact length of a TPMS manufacturer data payload.
pub const PAYLOAD_LENGTH: usize = 23;

/// Leading bytes of every TPMS payload.
///
/// iBeacon frames from unrelated vendors start with the same bytes. They are
/// accepted as well and decode to whatever their trailing bytes say.
pub const SIGNATURE: [u8; 2] = [0x02, 0x15];

/// Prefix of every [`SensorIdentity`].
pub const IDENTITY_PREFIX: &str = "tpms_";

const IDENTITY_OFFSET: usize = 18;
const TEMPERATURE_OFFSET: usize = 20;
const PRESSURE_OFFSET: usize = 21;
const TEMPERATURE_BIAS: i16 = 168;
const PRESSURE_SCALE: f64 = 10_000.0;

/// A payload that passed the length gate.
pub type Payload = [u8; PAYLOAD_LENGTH];

/// Manufacturer-specific data of one advertisement, keyed by company ID.
pub type ManufacturerData = HashMap<u16, Vec<u8>>;

/// Stable identifier of a TPMS sensor, e.g. `tpms_86BC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorIdentity(String);

impl SensorIdentity {
    fn from_sub_id(sub_id: [u8; 2]) -> Self {
        Self(format!("{IDENTITY_PREFIX}{:02X}{:02X}", sub_id[0], sub_id[1]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single received advertisement as delivered by a scanner backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Radio address of the sender (informational only)
    pub address: MacAddress,
    /// Manufacturer data entries of the advertisement
    pub manufacturer_data: ManufacturerData,
}

impl Advertisement {
    /// Build an advertisement carrying a single manufacturer data entry.
    pub fn new(address: MacAddress, manufacturer_id: u16, payload: Vec<u8>) -> Self {
        Self {
            address,
            manufacturer_data: HashMap::from([(manufacturer_id, payload)]),
        }
    }
}

/// Reason an advertisement was not decoded.
///
/// None of these are fatal: most advertisements a passive scanner sees are
/// not TPMS beacons at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The advertisement has no data under the configured manufacturer ID
    #[error("Not applicable: no manufacturer data for id {manufacturer_id:#06x}")]
    NotApplicable { manufacturer_id: u16 },
    /// Manufacturer data is present but has the wrong length
    #[error("Malformed length: expected {expected} bytes, got {actual}")]
    MalformedLength { expected: usize, actual: usize },
    /// Right length, wrong leading bytes
    #[error("Unrecognized signature: {found:04X}")]
    UnrecognizedSignature { found: u16 },
}

impl Rejection {
    /// Whether the advertisement simply was not meant for this decoder.
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Rejection::NotApplicable { .. })
    }
}

/// Check a manufacturer data payload and derive the sensor identity from it.
///
/// Returns the identity together with the payload, unchanged, as a fixed-size
/// array ready for [`decode`].
pub fn identify(payload: &[u8]) -> Result<(SensorIdentity, &Payload), Rejection> {
    let payload = <&Payload>::try_from(payload).map_err(|_| Rejection::MalformedLength {
        expected: PAYLOAD_LENGTH,
        actual: payload.len(),
    })?;

    if payload[..SIGNATURE.len()] != SIGNATURE {
        return Err(Rejection::UnrecognizedSignature {
            found: u16::from_be_bytes([payload[0], payload[1]]),
        });
    }

    let identity =
        SensorIdentity::from_sub_id([payload[IDENTITY_OFFSET], payload[IDENTITY_OFFSET + 1]]);
    Ok((identity, payload))
}

/// Decode temperature (°C) and pressure (bar) from a payload.
///
/// Pure arithmetic over fixed offsets; it cannot fail. Temperature spans
/// -168..=87 °C and pressure 0..=6.5535 bar.
pub fn decode(payload: &Payload) -> (f64, f64) {
    let temperature = i16::from(payload[TEMPERATURE_OFFSET]) - TEMPERATURE_BIAS;
    let pressure = u16::from_be_bytes([payload[PRESSURE_OFFSET], payload[PRESSURE_OFFSET + 1]]);
    (f64::from(temperature), f64::from(pressure) / PRESSURE_SCALE)
}

/// Errors returned when parsing a manufacturer ID.
#[derive(Error, Debug, PartialEq)]
pub enum ParseManufacturerIdError {
    #[error("invalid manufacturer id: '{0}' is not a 16-bit number")]
    Invalid(String),
}

/// Parse a manufacturer ID given in decimal (`76`) or hex (`0x004C`).
pub fn parse_manufacturer_id(src: &str) -> Result<u16, ParseManufacturerIdError> {
    let src = src.trim();
    let parsed = match src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => src.parse(),
    };
    parsed.map_err(|_| ParseManufacturerIdError::Invalid(src.to_string()))
}

/// Decoder for TPMS advertisements under a given manufacturer ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpmsDecoder {
    manufacturer_id: u16,
}

impl Default for TpmsDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MANUFACTURER_ID)
    }
}

impl TpmsDecoder {
    pub const fn new(manufacturer_id: u16) -> Self {
        Self { manufacturer_id }
    }

    pub const fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id
    }

    /// Run all gates and report which one rejected the advertisement.
    pub fn inspect<'a>(
        &self,
        manufacturer_data: &'a ManufacturerData,
    ) -> Result<(SensorIdentity, &'a Payload), Rejection> {
        let payload =
            manufacturer_data
                .get(&self.manufacturer_id)
                .ok_or(Rejection::NotApplicable {
                    manufacturer_id: self.manufacturer_id,
                })?;
        identify(payload)
    }

    /// Classify manufacturer data as a TPMS payload.
    ///
    /// Returns `None` for anything that is not a TPMS beacon.
    pub fn classify<'a>(
        &self,
        manufacturer_data: &'a ManufacturerData,
    ) -> Option<(SensorIdentity, &'a Payload)> {
        self.inspect(manufacturer_data).ok()
    }

    /// Classify and decode in one step, yielding pressure then temperature.
    pub fn decode_readings(
        &self,
        manufacturer_data: &ManufacturerData,
    ) -> Option<(SensorIdentity, DecodedReading, DecodedReading)> {
        self.readings(manufacturer_data).ok()
    }

    fn readings(
        &self,
        manufacturer_data: &ManufacturerData,
    ) -> Result<(SensorIdentity, DecodedReading, DecodedReading), Rejection> {
        let (identity, payload) = self.inspect(manufacturer_data)?;
        let (temperature, pressure) = decode(payload);
        Ok((
            identity,
            DecodedReading::pressure(pressure),
            DecodedReading::temperature(temperature),
        ))
    }

    /// Decode an advertisement into a timestamped [`Measurement`].
    pub fn decode_advertisement(
        &self,
        advertisement: &Advertisement,
    ) -> Result<Measurement, Rejection> {
        let (identity, pressure, temperature) = self.readings(&advertisement.manufacturer_data)?;
        Ok(Measurement {
            identity,
            mac: advertisement.address,
            timestamp: SystemTime::now(),
            temperature: temperature.value,
            pressure: pressure.value,
        })
    }

    /// Decode an advertisement and emit both readings into `sink`.
    ///
    /// Returns the sensor identity when the advertisement was a TPMS beacon;
    /// nothing is emitted otherwise.
    pub fn process(
        &self,
        advertisement: &Advertisement,
        sink: &mut dyn ReadingSink,
    ) -> Option<SensorIdentity> {
        let (identity, pressure, temperature) =
            self.decode_readings(&advertisement.manufacturer_data)?;
        for reading in [pressure, temperature] {
            sink.emit(&identity, &reading, reading.kind.label());
        }
        Some(identity)
    }
}
