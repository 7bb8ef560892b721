//! Airthings Wave over Bluetooth LE, through `btleplug`.

use std::time::Duration;

use btleplug::{
    api::{Central, Manager as _, Peripheral as _, ScanFilter},
    platform::{Adapter, Manager, Peripheral},
};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

use super::{AirQualitySensor, DriverError};
use crate::config::sensors::BleConfig;

const SCAN_POLL: Duration = Duration::from_millis(500);

fn ble_error(e: btleplug::Error) -> DriverError {
    DriverError::Ble(e.to_string())
}

/// One scan, connect, read and disconnect per sample. Nothing is kept
/// between reads.
pub struct BtleSensor {
    address: String,
    characteristic: Uuid,
    deadline: Duration,
}

impl BtleSensor {
    pub fn new(config: &BleConfig) -> Result<Self, DriverError> {
        let characteristic = Uuid::parse_str(&config.characteristic_uuid)
            .map_err(|_| DriverError::InvalidCharacteristic(config.characteristic_uuid.clone()))?;

        Ok(Self {
            address: config.device_address.trim().to_string(),
            characteristic,
            deadline: config.connect_timeout(),
        })
    }

    async fn adapter() -> Result<Adapter, DriverError> {
        let manager = Manager::new().await.map_err(ble_error)?;
        manager
            .adapters()
            .await
            .map_err(ble_error)?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Ble("no Bluetooth adapter found".into()))
    }

    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral, DriverError> {
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(ble_error)?;

        let found = loop {
            let peripherals = adapter.peripherals().await.map_err(ble_error)?;
            if let Some(p) = peripherals
                .into_iter()
                .find(|p| p.address().to_string().eq_ignore_ascii_case(&self.address))
            {
                break p;
            }
            sleep(SCAN_POLL).await;
        };

        if let Err(e) = adapter.stop_scan().await {
            debug!("Failed to stop BLE scan: {}", e);
        }
        Ok(found)
    }

    async fn read_characteristic(&self, peripheral: &Peripheral) -> Result<Vec<u8>, DriverError> {
        peripheral.connect().await.map_err(ble_error)?;
        peripheral.discover_services().await.map_err(ble_error)?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.characteristic)
            .ok_or_else(|| DriverError::CharacteristicNotFound(self.characteristic.to_string()))?;

        peripheral.read(&characteristic).await.map_err(ble_error)
    }
}

#[async_trait::async_trait]
impl AirQualitySensor for BtleSensor {
    async fn read_current_values(&self) -> Result<Vec<u8>, DriverError> {
        let deadline = Instant::now() + self.deadline;
        let timed_out = || DriverError::Timeout(self.deadline);

        let adapter = timeout_at(deadline, Self::adapter())
            .await
            .map_err(|_| timed_out())??;
        let peripheral = match timeout_at(deadline, self.find_peripheral(&adapter)).await {
            Ok(found) => found?,
            Err(_) => {
                if let Err(e) = adapter.stop_scan().await {
                    debug!("Failed to stop BLE scan: {}", e);
                }
                return Err(DriverError::PeripheralNotFound(self.address.clone()));
            }
        };

        let result = timeout_at(deadline, self.read_characteristic(&peripheral))
            .await
            .map_err(|_| timed_out())
            .and_then(|read| read);

        if let Err(e) = peripheral.disconnect().await {
            debug!("BLE disconnect from {} failed: {}", self.address, e);
        } else {
            debug!("BLE client {} disconnected", self.address);
        }
        result
    }
}
