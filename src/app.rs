//! Core application runner for `tpms-listener`.
//!
//! This module is decoupled from CLI parsing side effects and process exit
//! codes so it can be tested deterministically with a fake scanner.

use crate::alias::{Alias, AliasMap};
use crate::measurement::Measurement;
use crate::output::influxdb::InfluxDbFormatter;
use crate::output::{OutputFormatter, UnitSystem};
use crate::scanner::{Backend, MeasurementResult, ScanConfig, ScanError};
use crate::throttle::Throttle;
use crate::tpms::TpmsDecoder;
use clap::Parser;
use log::debug;
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "tpms_measurement")]
    pub influxdb_measurement: String,

    /// Specify human-readable alias for a sensor identity.
    /// Format: --alias tpms_86BC=Front left
    #[arg(long = "alias", value_parser = crate::alias::parse_alias, value_name = "ALIAS")]
    pub aliases: Vec<Alias>,

    /// Verbose output, print rejected TPMS advertisements and debug logs
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Throttle measurements per sensor to at most one per interval.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, value_parser = crate::throttle::parse_duration)]
    pub throttle: Option<Duration>,

    /// Advertisement source to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Manufacturer ID the sensors advertise under, decimal or 0x hex
    #[arg(long, default_value = "0x004C", value_parser = crate::tpms::parse_manufacturer_id)]
    pub manufacturer_id: u16,

    /// Units to print pressure and temperature in
    #[arg(long, default_value_t, value_enum)]
    pub units: UnitSystem,
}

impl Options {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            decoder: TpmsDecoder::new(self.manufacturer_id),
            verbose: self.verbose,
        }
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        config: ScanConfig,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<MeasurementResult>, ScanError>> + Send + '_>,
    >;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        config: ScanConfig,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<MeasurementResult>, ScanError>> + Send + '_>,
    > {
        Box::pin(async move { crate::scanner::start_scan(backend, config).await })
    }
}

fn write_measurement(
    formatter: &dyn OutputFormatter,
    measurement: &Measurement,
    name: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    let line = formatter.format(measurement, name);
    writeln!(out, "{line}")
}

/// Run the core processing loop, writing formatted output to `out` and verbose errors to `err`.
///
/// - On measurements, it optionally applies throttling per sensor identity,
///   resolves the sensor alias, formats them, and writes a line to `out`.
/// - On rejections, it writes the reason to `err` only when `options.verbose` is true.
/// - On any other scan error, it stops and returns the error.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let aliases: AliasMap = crate::alias::to_map(&options.aliases);
    let formatter = InfluxDbFormatter::new(options.influxdb_measurement.clone(), options.units);

    let mut throttle = options.throttle.map(Throttle::new);

    let mut measurements = scanner
        .start_scan(options.backend, options.scan_config())
        .await?;

    while let Some(result) = measurements.recv().await {
        match result {
            Ok(measurement) => {
                let should_emit = throttle
                    .as_mut()
                    .is_none_or(|t: &mut Throttle| t.should_emit(&measurement.identity));

                if should_emit {
                    let name = crate::alias::resolve_name(&measurement.identity, &aliases);
                    write_measurement(&formatter, &measurement, name, out)?;
                } else {
                    debug!("{}: throttled", measurement.identity);
                }
            }
            Err(ScanError::Decode(rejection)) => {
                if options.verbose {
                    writeln!(err, "{rejection}")?;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac_address::MacAddress;
    use crate::test_utils::{TEST_MAC, base_measurement, tpms_payload};
    use crate::tpms::{Advertisement, DEFAULT_MANUFACTURER_ID, Rejection};
    use std::sync::Mutex;
    use std::time::SystemTime;

    #[derive(Debug)]
    struct FakeScanner {
        results: Mutex<Vec<MeasurementResult>>,
        seen_config: Mutex<Option<ScanConfig>>,
    }

    impl FakeScanner {
        fn new(results: Vec<MeasurementResult>) -> Self {
            Self {
                results: Mutex::new(results),
                seen_config: Mutex::new(None),
            }
        }
    }

    impl Scanner for FakeScanner {
        fn start_scan(
            &self,
            _backend: Backend,
            config: ScanConfig,
        ) -> Pin<
            Box<
                dyn Future<Output = Result<mpsc::Receiver<MeasurementResult>, ScanError>>
                    + Send
                    + '_,
            >,
        > {
            *self.seen_config.lock().unwrap() = Some(config);
            let results = self.results.lock().unwrap().clone();
            Box::pin(async move {
                let (tx, rx) = mpsc::channel::<MeasurementResult>(results.len().max(1));
                tokio::spawn(async move {
                    for r in results {
                        let _ = tx.send(r).await;
                    }
                });
                Ok(rx)
            })
        }
    }

    fn options() -> Options {
        Options::parse_from(["tpms-listener", "--backend", "replay"])
    }

    fn measurement(mac: MacAddress) -> Measurement {
        let mut m = base_measurement(mac, SystemTime::UNIX_EPOCH + Duration::from_secs(1));
        m.temperature = 25.0;
        m.pressure = 2.4;
        m
    }

    #[test]
    fn test_options_defaults() {
        let options = options();
        assert_eq!(options.influxdb_measurement, "tpms_measurement");
        assert_eq!(options.manufacturer_id, DEFAULT_MANUFACTURER_ID);
        assert_eq!(options.units, UnitSystem::Metric);
        assert!(options.throttle.is_none());
        assert!(!options.verbose);
    }

    #[test]
    fn test_options_parse_all() {
        let options = Options::parse_from([
            "tpms-listener",
            "--backend",
            "replay",
            "--manufacturer-id",
            "256",
            "--alias",
            "tpms_86bc=Front left",
            "--throttle",
            "30s",
            "--units",
            "imperial",
            "-v",
        ]);
        assert_eq!(options.manufacturer_id, 256);
        assert_eq!(options.aliases[0].sensor, "tpms_86BC");
        assert_eq!(options.throttle, Some(Duration::from_secs(30)));
        assert_eq!(options.units, UnitSystem::Imperial);
        assert_eq!(
            options.scan_config(),
            ScanConfig {
                decoder: TpmsDecoder::new(256),
                verbose: true,
            }
        );
    }

    #[tokio::test]
    async fn run_writes_measurements_to_out() {
        let scanner = FakeScanner::new(vec![Ok(measurement(TEST_MAC))]);

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        run_with_io(options(), &scanner, &mut out, &mut err)
            .await
            .unwrap();

        assert!(err.is_empty());

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("tpms_measurement,"));
        assert!(out.contains("mac=AA:BB:CC:DD:EE:FF"));
        assert!(out.contains("sensor=tpms_86BC"));
        assert!(out.contains("pressure=2.4"));
        assert!(out.contains("temperature=25"));
        assert!(out.ends_with('\n'));
    }

    #[tokio::test]
    async fn run_uses_alias_as_name() {
        let scanner = FakeScanner::new(vec![Ok(measurement(TEST_MAC))]);
        let mut options = options();
        options.aliases = vec![crate::alias::parse_alias("tpms_86BC=Spare").unwrap()];

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        run_with_io(options, &scanner, &mut out, &mut err)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("name=Spare"));
    }

    #[tokio::test]
    async fn run_throttles_per_sensor_not_per_address() {
        // same sensor relayed through two radio addresses
        let other_mac = MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let scanner = FakeScanner::new(vec![
            Ok(measurement(TEST_MAC)),
            Ok(measurement(other_mac)),
        ]);
        let mut options = options();
        options.throttle = Some(Duration::from_secs(3600));

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        run_with_io(options, &scanner, &mut out, &mut err)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
    }

    #[tokio::test]
    async fn run_prints_rejections_only_when_verbose() {
        let scanner = FakeScanner::new(vec![Err(ScanError::Decode(Rejection::MalformedLength {
            expected: 23,
            actual: 16,
        }))]);

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        run_with_io(options(), &scanner, &mut out, &mut err)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(err.is_empty());

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        let mut verbose = options();
        verbose.verbose = true;
        run_with_io(verbose, &scanner, &mut out, &mut err)
            .await
            .unwrap();

        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("Malformed length: expected 23 bytes, got 16"));
    }

    #[tokio::test]
    async fn run_stops_on_failed_source() {
        let scanner = FakeScanner::new(vec![
            Ok(measurement(TEST_MAC)),
            Err(ScanError::Io("stream closed unexpectedly".to_string())),
            Ok(measurement(TEST_MAC)),
        ]);

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        let result = run_with_io(options(), &scanner, &mut out, &mut err).await;

        assert!(matches!(
            result,
            Err(RunError::Scan(ScanError::Io(ref reason))) if reason == "stream closed unexpectedly"
        ));
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn run_decodes_raw_advertisements() {
        let config = options().scan_config();
        let advertisement = Advertisement::new(
            TEST_MAC,
            DEFAULT_MANUFACTURER_ID,
            tpms_payload([0x86, 0xBC], 0xC1, [0x83, 0x9C]),
        );
        let decoded = config.decoder.decode_advertisement(&advertisement);
        let scanner = FakeScanner::new(vec![decoded.map_err(ScanError::from)]);

        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        tokio_test::block_on(run_with_io(options(), &scanner, &mut out, &mut err)).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("pressure=3.3692,temperature=25 "));
        assert_eq!(*scanner.seen_config.lock().unwrap(), Some(config));
    }
}
