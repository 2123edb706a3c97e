//! Output formatters for TPMS measurements.
//!
//! The listener writes one line per measurement to stdout. Formatters decide
//! what that line looks like and in which units the values are presented.

pub mod influxdb;

use crate::measurement::Measurement;
use crate::reading::{DecodedReading, SensorKind};

/// Units used when presenting measurements.
///
/// The decoder always produces bar and °C; conversion happens only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnitSystem {
    /// Pressure in bar, temperature in °C
    #[default]
    Metric,
    /// Pressure in psi, temperature in °F
    Imperial,
}

const PSI_PER_BAR: f64 = 14.503_773_773;

impl UnitSystem {
    pub fn pressure(self, bar: f64) -> f64 {
        match self {
            UnitSystem::Metric => bar,
            UnitSystem::Imperial => bar * PSI_PER_BAR,
        }
    }

    pub fn temperature(self, celsius: f64) -> f64 {
        match self {
            UnitSystem::Metric => celsius,
            UnitSystem::Imperial => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Value of a decoded reading in this unit system.
    pub fn convert(self, reading: &DecodedReading) -> f64 {
        match reading.kind {
            SensorKind::Pressure => self.pressure(reading.value),
            SensorKind::Temperature => self.temperature(reading.value),
        }
    }
}

/// Trait for formatting measurements into output strings.
pub trait OutputFormatter: Send + Sync {
    /// Format a measurement.
    ///
    /// # Arguments
    /// * `measurement` - The measurement data to format (includes timestamp)
    /// * `name` - Display name of the sensor (alias or identity)
    fn format(&self, measurement: &Measurement, name: &str) -> String;
}
