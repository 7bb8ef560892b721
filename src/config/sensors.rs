//! Sensor sampling configuration.
//!
//! ```toml
//! [sensors]
//! measure_interval = 30
//! sample_timeout = 10
//!
//! [sensors.environment]
//! driver = "bme280"
//! i2c_bus_id = 1
//! i2c_device_address = 0x76
//!
//! [sensors.ble]
//! device_address = "AA:BB:CC:DD:EE:FF"
//! measure_interval = 300
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Primary BME280 address (SDO to GND).
pub const BME280_PRIMARY_ADDRESS: u8 = 0x76;

/// Secondary BME280 address (SDO to VDDIO).
pub const BME280_SECONDARY_ADDRESS: u8 = 0x77;

/// Airthings Wave "current values" characteristic.
pub const AIRTHINGS_WAVE_CHARACTERISTIC: &str = "b42e01aa-ade7-11e4-89d3-123b93f75cba";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorsConfig {
    /// Seconds between environmental samples.
    #[validate(range(
        min = 1,
        max = 86400,
        message = "Measure interval must be between 1 and 86400 seconds"
    ))]
    pub measure_interval: u64,

    /// Deadline in seconds for a single I2C sample.
    #[validate(range(
        min = 1,
        max = 600,
        message = "Sample timeout must be between 1 and 600 seconds"
    ))]
    pub sample_timeout: u64,

    #[validate(nested)]
    pub environment: EnvironmentConfig,

    #[validate(nested)]
    pub ble: BleConfig,
}

impl SensorsConfig {
    pub fn measure_interval(&self) -> Duration {
        Duration::from_secs(self.measure_interval)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout)
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        SensorsConfig {
            measure_interval: 30,
            sample_timeout: 10,
            environment: EnvironmentConfig::default(),
            ble: BleConfig::default(),
        }
    }
}

/// Backend that produces environmental readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentDriver {
    /// Bosch BME280/BMP280 over Linux I2C.
    #[default]
    Bme280,
    /// Generated values, for running without hardware.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub enabled: bool,

    pub driver: EnvironmentDriver,

    /// `N` in `/dev/i2c-N`.
    pub i2c_bus_id: u8,

    #[validate(custom(
        function = "validate_bme280_address",
        message = "I2C device address must be 0x76 or 0x77"
    ))]
    pub i2c_device_address: u8,
}

impl EnvironmentConfig {
    pub fn i2c_bus_path(&self) -> String {
        format!("/dev/i2c-{}", self.i2c_bus_id)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            enabled: true,
            driver: EnvironmentDriver::default(),
            i2c_bus_id: 1,
            i2c_device_address: BME280_PRIMARY_ADDRESS,
        }
    }
}

fn validate_bme280_address(address: u8) -> Result<(), ValidationError> {
    match address {
        BME280_PRIMARY_ADDRESS | BME280_SECONDARY_ADDRESS => Ok(()),
        _ => Err(ValidationError::new("invalid_i2c_address")),
    }
}

/// Bluetooth LE air-quality sensor. Disabled while `device_address` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BleConfig {
    /// MAC address, compared case-insensitively.
    pub device_address: String,

    #[validate(custom(
        function = "validate_uuid",
        message = "Characteristic must be a UUID"
    ))]
    pub characteristic_uuid: String,

    /// Seconds between BLE samples.
    #[validate(range(
        min = 1,
        max = 86400,
        message = "BLE measure interval must be between 1 and 86400 seconds"
    ))]
    pub measure_interval: u64,

    /// Deadline in seconds for scan, connect and read together.
    #[validate(range(
        min = 1,
        max = 300,
        message = "BLE connect timeout must be between 1 and 300 seconds"
    ))]
    pub connect_timeout: u64,
}

impl BleConfig {
    pub fn is_enabled(&self) -> bool {
        !self.device_address.trim().is_empty()
    }

    pub fn measure_interval(&self) -> Duration {
        Duration::from_secs(self.measure_interval)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            device_address: String::new(),
            characteristic_uuid: AIRTHINGS_WAVE_CHARACTERISTIC.to_string(),
            measure_interval: 300,
            connect_timeout: 30,
        }
    }
}

fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_uuid"))
}
