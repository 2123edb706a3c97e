//! InfluxDB line protocol output formatter.

use crate::measurement::Measurement;
use crate::output::{OutputFormatter, UnitSystem};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<&'static str, String>,
    pub field_set: BTreeMap<&'static str, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

/// Escape commas, equals signs and spaces in tag keys and values.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.measurement.replace(',', "\\,").replace(' ', "\\ "))?;
        for (key, value) in &self.tag_set {
            write!(fmt, ",{}={}", key, escape_tag(value))?;
        }

        let mut separator = " ";
        for (key, value) in &self.field_set {
            write!(fmt, "{separator}{key}={value}")?;
            separator = ",";
        }

        if let Some(nanos) = self
            .timestamp
            .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
        {
            write!(fmt, " {}", nanos.as_nanos())?;
        }
        Ok(())
    }
}

/// InfluxDB line protocol formatter.
///
/// Produces lines like
/// `tpms_measurement,mac=AA:BB:CC:DD:EE:FF,name=Front\ left,sensor=tpms_86BC pressure=3.3692,temperature=25 1000000000000000000`.
pub struct InfluxDbFormatter {
    measurement_name: String,
    units: UnitSystem,
}

impl InfluxDbFormatter {
    /// Create a new InfluxDB formatter.
    ///
    /// # Arguments
    /// * `measurement_name` - The measurement name to use in the line protocol
    /// * `units` - Units to present pressure and temperature in
    pub fn new(measurement_name: String, units: UnitSystem) -> Self {
        Self {
            measurement_name,
            units,
        }
    }

    fn to_data_point(&self, m: &Measurement, name: &str) -> DataPoint {
        let tag_set = BTreeMap::from([
            ("mac", m.mac.to_string()),
            ("name", name.to_string()),
            ("sensor", m.identity.to_string()),
        ]);

        let field_set = m
            .readings()
            .into_iter()
            .map(|reading| (reading.kind.key(), FieldValue::Float(self.units.convert(&reading))))
            .collect();

        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set,
            field_set,
            timestamp: Some(m.timestamp),
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, measurement: &Measurement, name: &str) -> String {
        self.to_data_point(measurement, name).to_string()
    }
}
