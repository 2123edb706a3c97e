//! Decoded readings and the sink they are emitted into.

use crate::tpms::SensorIdentity;
use std::collections::BTreeMap;
use std::fmt;

/// The two quantities a TPMS sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorKind {
    Pressure,
    Temperature,
}

impl SensorKind {
    /// Stable key used for binding readings to downstream entities.
    pub const fn key(self) -> &'static str {
        match self {
            SensorKind::Pressure => "pressure",
            SensorKind::Temperature => "temperature",
        }
    }

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            SensorKind::Pressure => "Pressure",
            SensorKind::Temperature => "Temperature",
        }
    }

    pub const fn unit(self) -> Unit {
        match self {
            SensorKind::Pressure => Unit::Bar,
            SensorKind::Temperature => Unit::Celsius,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Physical unit of a decoded reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bar,
    Celsius,
}

impl Unit {
    pub const fn symbol(self) -> &'static str {
        match self {
            Unit::Bar => "bar",
            Unit::Celsius => "°C",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single physical measurement decoded from an advertisement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedReading {
    pub kind: SensorKind,
    pub value: f64,
    pub unit: Unit,
}

impl DecodedReading {
    /// Pressure in bar.
    pub fn pressure(bar: f64) -> Self {
        Self {
            kind: SensorKind::Pressure,
            value: bar,
            unit: SensorKind::Pressure.unit(),
        }
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(celsius: f64) -> Self {
        Self {
            kind: SensorKind::Temperature,
            value: celsius,
            unit: SensorKind::Temperature.unit(),
        }
    }
}

/// Receiver of decoded readings.
///
/// The decoder only records data here. Naming entities, attaching device
/// metadata and persisting anything is up to the implementation.
pub trait ReadingSink {
    fn emit(&mut self, identity: &SensorIdentity, reading: &DecodedReading, label: &str);
}

/// A reading as stored by [`ReadingMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReading {
    pub value: f64,
    pub unit: Unit,
    pub label: String,
}

/// In-memory sink keyed by `<identity>_<kind>`, e.g. `tpms_86BC_pressure`.
///
/// Emitting a reading for a key that already exists replaces the old value.
#[derive(Debug, Clone, Default)]
pub struct ReadingMap {
    readings: BTreeMap<String, RecordedReading>,
}

impl ReadingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(identity: &SensorIdentity, kind: SensorKind) -> String {
        format!("{identity}_{kind}")
    }

    pub fn get(&self, key: &str) -> Option<&RecordedReading> {
        self.readings.get(key)
    }

    pub fn reading(
        &self,
        identity: &SensorIdentity,
        kind: SensorKind,
    ) -> Option<&RecordedReading> {
        self.readings.get(&Self::key(identity, kind))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordedReading)> {
        self.readings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ReadingSink for ReadingMap {
    fn emit(&mut self, identity: &SensorIdentity, reading: &DecodedReading, label: &str) {
        self.readings.insert(
            Self::key(identity, reading.kind),
            RecordedReading {
                value: reading.value,
                unit: reading.unit,
                label: label.to_string(),
            },
        );
    }
}
