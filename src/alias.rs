//! Human-readable names for TPMS sensors.
//!
//! Sensors are known by their payload identity (`tpms_86BC`), which says
//! nothing about which wheel they sit on. Aliases map identities to names
//! like `Front left`.

use crate::tpms::{IDENTITY_PREFIX, SensorIdentity};
use std::collections::BTreeMap;

/// A type alias for identity-to-name mappings.
pub type AliasMap = BTreeMap<String, String>;

/// A parsed alias mapping a sensor identity to a human-readable name.
#[derive(Debug, Clone)]
pub struct Alias {
    /// The sensor identity, normalized to uppercase hex (e.g. "tpms_86BC")
    pub sensor: String,
    /// The human-readable name (e.g. "Front left")
    pub name: String,
}

/// Parse an alias from a string in the format "IDENTITY=NAME".
///
/// The `tpms_` prefix is optional and the hex digits are case-insensitive.
///
/// # Example
/// ```
/// use tpms_listener::alias::parse_alias;
///
/// let alias = parse_alias("tpms_86bc=Front left").unwrap();
/// assert_eq!(alias.sensor, "tpms_86BC");
/// assert_eq!(alias.name, "Front left");
/// ```
pub fn parse_alias(src: &str) -> Result<Alias, String> {
    let (sensor, name) = src
        .split_once('=')
        .ok_or_else(|| "invalid alias: expected format IDENTITY=NAME".to_string())?;

    let sensor = sensor.trim();
    let hex = sensor.strip_prefix(IDENTITY_PREFIX).unwrap_or(sensor);
    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid alias: '{sensor}' is not a sensor identity like {IDENTITY_PREFIX}86BC"
        ));
    }
    if name.is_empty() {
        return Err("invalid alias: name is empty".to_string());
    }

    Ok(Alias {
        sensor: format!("{IDENTITY_PREFIX}{}", hex.to_ascii_uppercase()),
        name: name.into(),
    })
}

/// Convert a slice of Alias values into an AliasMap.
pub fn to_map(aliases: &[Alias]) -> AliasMap {
    aliases
        .iter()
        .map(|a| (a.sensor.clone(), a.name.clone()))
        .collect()
}

/// Name to report for a sensor: its alias, or the identity itself.
pub fn resolve_name<'a>(identity: &'a SensorIdentity, aliases: &'a AliasMap) -> &'a str {
    aliases
        .get(identity.as_str())
        .map_or(identity.as_str(), String::as_str)
}
