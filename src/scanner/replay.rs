//! Replay backend: hex-dumped advertisements read from stdin.
//!
//! Each line holds one advertisement:
//!
//! ```text
//! # address          manufacturer-id  payload
//! C3:00:00:0A:86:BC  0x004C           0215...86BCC1839C
//! ```
//!
//! The manufacturer ID is decimal or `0x` hex. Blank lines and lines starting
//! with `#` are skipped. Lines that cannot be parsed are logged and skipped.

use super::{
    MEASUREMENT_CHANNEL_BUFFER_SIZE, MeasurementResult, ScanConfig, ScanError,
    classify_advertisement,
};
use crate::mac_address::{MacAddress, ParseMacError};
use crate::tpms::{Advertisement, ParseManufacturerIdError, parse_manufacturer_id};
use log::{debug, warn};
use std::io::{self, BufRead};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors for a single replay line.
#[derive(Error, Debug, PartialEq)]
pub enum ReplayLineError {
    #[error("expected 'ADDRESS MANUFACTURER_ID HEX', got {0} fields")]
    FieldCount(usize),
    #[error(transparent)]
    Address(#[from] ParseMacError),
    #[error(transparent)]
    ManufacturerId(#[from] ParseManufacturerIdError),
    #[error("invalid payload hex: {0}")]
    Payload(#[from] hex::FromHexError),
}

/// Parse one replay line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Advertisement>, ReplayLineError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let &[address, manufacturer_id, payload] = fields.as_slice() else {
        return Err(ReplayLineError::FieldCount(fields.len()));
    };

    Ok(Some(Advertisement::new(
        address.parse::<MacAddress>()?,
        parse_manufacturer_id(manufacturer_id)?,
        hex::decode(payload)?,
    )))
}

/// Decode every line of `reader` and send the results through `tx`.
///
/// Lines that are not valid UTF-8 are decoded lossily, so they fail to parse
/// and get skipped like any other bad line. Only a failing read ends the
/// replay with an error. Stops early when the receiving side is gone.
pub fn replay_lines<R: BufRead>(
    mut reader: R,
    config: &ScanConfig,
    tx: &mpsc::Sender<MeasurementResult>,
) -> Result<(), ScanError> {
    let mut buf = Vec::new();
    let mut number = 0;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| ScanError::Io(e.to_string()))?;
        if read == 0 {
            break;
        }
        number += 1;

        let advertisement = match parse_line(&String::from_utf8_lossy(&buf)) {
            Ok(Some(advertisement)) => advertisement,
            Ok(None) => continue,
            Err(e) => {
                warn!("line {number}: {e}");
                continue;
            }
        };

        if let Some(result) = classify_advertisement(config, &advertisement)
            && tx.blocking_send(result).is_err()
        {
            debug!("Receiver dropped, stopping replay");
            break;
        }
    }
    Ok(())
}

/// Replay `reader` and hand a failed read to the consumer as the last item.
fn replay<R: BufRead>(reader: R, config: &ScanConfig, tx: &mpsc::Sender<MeasurementResult>) {
    if let Err(e) = replay_lines(reader, config, tx) {
        let _ = tx.blocking_send(Err(e));
    }
}

/// Start replaying advertisements from stdin.
///
/// Reading happens on a dedicated thread since stdin is blocking. The channel
/// closes at end of input.
pub fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<MeasurementResult>, ScanError> {
    let (tx, rx) = mpsc::channel(MEASUREMENT_CHANNEL_BUFFER_SIZE);

    std::thread::Builder::new()
        .name("tpms-replay".into())
        .spawn(move || replay(io::stdin().lock(), &config, &tx))
        .map_err(|e| ScanError::Io(e.to_string()))?;

    Ok(rx)
}
