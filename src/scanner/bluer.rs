//! BlueZ D-Bus backend for TPMS scanning.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{
    MANUFACTURER_DATA_TYPE, MEASUREMENT_CHANNEL_BUFFER_SIZE, MeasurementResult, ScanConfig,
    ScanError, classify_advertisement,
};
use crate::tpms::{Advertisement, SIGNATURE};
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Advertisement monitor pattern matching TPMS manufacturer data.
///
/// The AD structure content starts with the company ID in little-endian
/// order, followed by the payload, so the signature is matched as well.
fn tpms_pattern(manufacturer_id: u16) -> Pattern {
    let mut content = manufacturer_id.to_le_bytes().to_vec();
    content.extend_from_slice(&SIGNATURE);
    Pattern {
        data_type: MANUFACTURER_DATA_TYPE,
        start_position: 0,
        content,
    }
}

/// Start a passive scan for TPMS advertisements through BlueZ.
///
/// Discovered measurements are sent through the returned channel. Runs
/// indefinitely until interrupted.
pub async fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<MeasurementResult>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    info!(
        "Listening on {} for manufacturer id {:#06x}",
        adapter.name(),
        config.decoder.manufacturer_id()
    );

    let (tx, rx) = mpsc::channel(MEASUREMENT_CHANNEL_BUFFER_SIZE);

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![tpms_pattern(config.decoder.manufacturer_id())]),
            ..Default::default()
        })
        .await?;

    // The task owns all Bluetooth state so it lives as long as the scan
    tokio::spawn(async move {
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            if let MonitorEvent::DeviceFound(device_id) = event
                && let Err(e) = process_device(&adapter, device_id.device, &tx, &config).await
            {
                warn!("{}: {}", device_id.device, e);
            }
        }
        debug!("Advertisement monitor closed");
    });

    Ok(rx)
}

/// Read the manufacturer data of a discovered device and decode it.
async fn process_device(
    adapter: &Adapter,
    address: Address,
    tx: &mpsc::Sender<MeasurementResult>,
    config: &ScanConfig,
) -> Result<(), ScanError> {
    let device = adapter.device(address)?;

    let Some(manufacturer_data) = device.manufacturer_data().await? else {
        return Ok(());
    };

    let advertisement = Advertisement {
        address: address.into(),
        manufacturer_data,
    };

    if let Some(result) = classify_advertisement(config, &advertisement) {
        let _ = tx.send(result).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpms::DEFAULT_MANUFACTURER_ID;

    #[test]
    fn test_tpms_pattern() {
        let pattern = tpms_pattern(DEFAULT_MANUFACTURER_ID);
        assert_eq!(pattern.data_type, 0xff);
        assert_eq!(pattern.start_position, 0);
        assert_eq!(pattern.content, vec![0x4C, 0x00, 0x02, 0x15]);
    }

    #[test]
    fn test_tpms_pattern_custom_manufacturer() {
        let pattern = tpms_pattern(0x0100);
        assert_eq!(pattern.content, vec![0x00, 0x01, 0x02, 0x15]);
    }
}
