//! TPMS measurement data structure.

use crate::mac_address::MacAddress;
use crate::reading::DecodedReading;
use crate::tpms::SensorIdentity;

/// One decoded advertisement from a TPMS sensor.
///
/// Values are kept in the units the sensor reports:
/// - Temperature in Celsius
/// - Pressure in bar
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Identity derived from the payload (e.g. `tpms_86BC`)
    pub identity: SensorIdentity,
    /// Radio address the advertisement arrived from
    pub mac: MacAddress,
    /// Timestamp when the advertisement was decoded
    pub timestamp: std::time::SystemTime,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Pressure in bar
    pub pressure: f64,
}

impl Measurement {
    /// The measurement as its two readings, pressure first.
    pub fn readings(&self) -> [DecodedReading; 2] {
        [
            DecodedReading::pressure(self.pressure),
            DecodedReading::temperature(self.temperature),
        ]
    }
}
