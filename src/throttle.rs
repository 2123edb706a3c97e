//! Per-sensor throttling of TPMS measurements.
//!
//! TPMS sensors advertise several times per second while the wheel turns, yet
//! tire pressure changes slowly. The throttle lets at most one measurement per
//! sensor through per interval.

use crate::tpms::SensorIdentity;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Limits the rate of measurements per sensor identity.
///
/// Each sensor is tracked independently. The first measurement of a sensor is
/// always allowed.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_seen: HashMap<SensorIdentity, Instant>,
}

impl Throttle {
    /// Create a new throttle with the minimum interval between measurements.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use tpms_listener::throttle::Throttle;
    ///
    /// let throttle = Throttle::new(Duration::from_secs(30));
    /// ```
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_seen: HashMap::new(),
        }
    }

    /// Check whether a measurement from `sensor` should be emitted.
    ///
    /// Returns `true` if the interval has passed since the last emitted
    /// measurement of this sensor, and restarts its timer. Blocked
    /// measurements do not restart the timer.
    pub fn should_emit(&mut self, sensor: &SensorIdentity) -> bool {
        self.should_emit_at(sensor, Instant::now())
    }

    fn should_emit_at(&mut self, sensor: &SensorIdentity, now: Instant) -> bool {
        match self.last_seen.get(sensor) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_seen.insert(sensor.clone(), now);
                true
            }
        }
    }
}

/// Parse a duration from a human-readable string.
///
/// Accepts `ms`, `s`, `m` and `h` suffixes. A bare number means seconds.
///
/// # Examples
/// ```
/// use tpms_listener::throttle::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    // "ms" must be tried before "m" and "s"
    const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)];

    let (num, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, factor)| src.strip_suffix(suffix).map(|num| (num, *factor)))
        .unwrap_or((src, 1_000));

    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {src}"))
}
