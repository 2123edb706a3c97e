//! `tpms-listener` library.
//!
//! The decoder for TPMS beacon advertisements lives in [`crate::tpms`] and is
//! a set of pure functions over advertisement bytes. The binary
//! (`src/main.rs`) is responsible for CLI parsing, logging setup and process
//! exit codes; the run loop lives in [`crate::app`] where it can be tested
//! deterministically with an injected scanner and injected output streams.

pub mod alias;
pub mod app;
pub mod mac_address;
pub mod measurement;
pub mod output;
pub mod reading;
pub mod scanner;
pub mod throttle;
pub mod tpms;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use alias::{Alias, AliasMap, parse_alias, resolve_name, to_map};
pub use mac_address::MacAddress;
pub use measurement::Measurement;
pub use output::influxdb::InfluxDbFormatter;
pub use output::{OutputFormatter, UnitSystem};
pub use reading::{DecodedReading, ReadingMap, ReadingSink, SensorKind, Unit};
pub use scanner::{Backend, MeasurementResult, ScanConfig, ScanError};
pub use throttle::{Throttle, parse_duration};
pub use tpms::{
    Advertisement, DEFAULT_MANUFACTURER_ID, ManufacturerData, Rejection, SensorIdentity,
    TpmsDecoder, decode, identify,
};
