//! Advertisement sources for the TPMS listener.
//!
//! Every backend turns whatever it receives into [`Advertisement`]s and runs
//! them through the shared [`TpmsDecoder`], so decoding behaves identically
//! regardless of where the bytes came from.

#[cfg(feature = "bluer")]
pub mod bluer;

pub mod replay;

use crate::measurement::Measurement;
use crate::tpms::{Advertisement, Rejection, TpmsDecoder};
use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;

/// Convenience alias for decoded measurements or scan errors.
///
/// [`ScanError::Decode`] items are rejected advertisements. Any other error
/// means the source failed and no further items will follow.
pub type MeasurementResult = Result<Measurement, ScanError>;

/// Error type for scanner operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    /// Advertisement rejected by the decoder
    #[error("Decode error: {0}")]
    Decode(#[from] Rejection),
    /// Reading replayed advertisements failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
pub const MANUFACTURER_DATA_TYPE: u8 = 0xff;

/// Channel buffer size for measurement results.
pub const MEASUREMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Settings shared by all scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanConfig {
    /// Decoder configured with the manufacturer ID to listen for
    pub decoder: TpmsDecoder,
    /// Forward rejected TPMS-looking advertisements as `Err` values
    pub verbose: bool,
}

/// Available advertisement sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Hex-dumped advertisements read from stdin, one per line
    Replay,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(not(feature = "bluer"))]
        return Backend::Replay;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            Backend::Replay => write!(f, "replay"),
        }
    }
}

/// Decode one advertisement and decide whether it should reach the consumer.
///
/// Advertisements without the configured manufacturer ID are never forwarded.
/// Other rejections are forwarded only in verbose mode. All rejections are
/// logged at debug level.
pub(crate) fn classify_advertisement(
    config: &ScanConfig,
    advertisement: &Advertisement,
) -> Option<MeasurementResult> {
    match config.decoder.decode_advertisement(advertisement) {
        Ok(measurement) => Some(Ok(measurement)),
        Err(rejection) => {
            debug!("{}: {}", advertisement.address, rejection);
            (config.verbose && !rejection.is_not_applicable()).then_some(Err(rejection.into()))
        }
    }
}

/// Start listening for TPMS advertisements using the specified backend.
///
/// # Returns
/// A receiver for measurements (or rejections if verbose).
pub async fn start_scan(
    backend: Backend,
    config: ScanConfig,
) -> Result<mpsc::Receiver<MeasurementResult>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan(config).await,
        Backend::Replay => replay::start_scan(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_MAC, tpms_payload};
    use crate::tpms::DEFAULT_MANUFACTURER_ID;

    fn config(verbose: bool) -> ScanConfig {
        ScanConfig {
            decoder: TpmsDecoder::default(),
            verbose,
        }
    }

    #[test]
    fn test_classify_advertisement_decodes() {
        let advertisement = Advertisement::new(
            TEST_MAC,
            DEFAULT_MANUFACTURER_ID,
            tpms_payload([0x86, 0xBC], 0xC1, [0x83, 0x9C]),
        );
        let measurement = classify_advertisement(&config(false), &advertisement)
            .unwrap()
            .unwrap();
        assert_eq!(measurement.identity.as_str(), "tpms_86BC");
        assert_eq!(measurement.mac, TEST_MAC);
        assert!(measurement.timestamp.elapsed().is_ok());
    }

    #[test]
    fn test_classify_advertisement_rejections() {
        let malformed = Advertisement::new(TEST_MAC, DEFAULT_MANUFACTURER_ID, vec![0x02, 0x15]);
        assert!(classify_advertisement(&config(false), &malformed).is_none());
        assert_eq!(
            classify_advertisement(&config(true), &malformed),
            Some(Err(ScanError::Decode(Rejection::MalformedLength {
                expected: 23,
                actual: 2
            })))
        );

        let foreign = Advertisement::new(TEST_MAC, 0x0499, vec![0x05; 24]);
        assert!(classify_advertisement(&config(true), &foreign).is_none());
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::Decode(Rejection::UnrecognizedSignature { found: 0x0499 });
        assert_eq!(
            format!("{}", err),
            "Decode error: Unrecognized signature: 0499"
        );
        let err = ScanError::Io("stream did not contain valid UTF-8".to_string());
        assert_eq!(
            format!("{}", err),
            "I/O error: stream did not contain valid UTF-8"
        );
    }

    #[cfg(feature = "bluer")]
    #[test]
    fn test_backend_bluer() {
        assert_eq!(Backend::default(), Backend::Bluer);
        assert_eq!(format!("{}", Backend::Bluer), "bluer");
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(format!("{}", Backend::Replay), "replay");
    }
}
