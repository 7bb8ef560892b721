//! Sensor driver adapters.
//!
//! The environmental sensor is a blocking I2C device, the air-quality sensor
//! an async BLE peripheral. Both are reached through traits so the
//! collectors can be driven by fakes.

use std::time::Duration;

use crate::config::sensors::{BleConfig, EnvironmentConfig, EnvironmentDriver};

pub mod airthings;
#[cfg(feature = "bme280")]
pub mod bme280;
#[cfg(feature = "ble")]
pub mod ble;
pub mod simulated;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Failed to open I2C bus {path}: {reason}")]
    Bus { path: String, reason: String },

    #[error("Failed to probe chip at 0x{address:02x}: {reason}")]
    Probe { address: u8, reason: String },

    #[error("Unsupported chip id 0x{0:02x}")]
    UnsupportedChip(u8),

    #[error("Sensor read failed: {0}")]
    Read(String),

    #[error("Invalid characteristic UUID '{0}'")]
    InvalidCharacteristic(String),

    #[error("{0} support is not compiled in")]
    Unavailable(&'static str),

    #[error("Bluetooth error: {0}")]
    Ble(String),

    #[error("Peripheral {0} not found")]
    PeripheralNotFound(String),

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Payload too short: expected {expected} bytes, got {actual}")]
    ShortPayload { expected: usize, actual: usize },
}

impl DriverError {
    /// Fatal errors mean the hardware or its configuration is broken and
    /// will not recover inside this process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Bus { .. }
                | DriverError::Probe { .. }
                | DriverError::UnsupportedChip(_)
                | DriverError::Read(_)
                | DriverError::InvalidCharacteristic(_)
                | DriverError::Unavailable(_)
        )
    }
}

/// Humidity part of a raw reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Humidity {
    /// Percent relative humidity.
    Measured(f32),
    /// The chip has no humidity sensor.
    Unsupported,
    /// Not requested.
    Skipped,
}

/// One environmental sample as the chip reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Pascals.
    pub pressure: f32,
    pub humidity: Humidity,
}

/// Blocking temperature/pressure/humidity sensor.
pub trait EnvironmentalSensor: Send {
    fn model(&self) -> &str;

    /// Takes one sample. Humidity is only read when `with_humidity` is set.
    fn sample(&mut self, with_humidity: bool) -> Result<RawReading, DriverError>;
}

/// Sensor exposing its current values as one raw characteristic.
#[async_trait::async_trait]
pub trait AirQualitySensor: Send + Sync {
    async fn read_current_values(&self) -> Result<Vec<u8>, DriverError>;
}

/// Opens sensors at startup.
pub trait SensorFactory {
    fn open_environmental(
        &self,
        config: &EnvironmentConfig,
    ) -> Result<Box<dyn EnvironmentalSensor>, DriverError>;

    fn open_air_quality(&self, config: &BleConfig)
        -> Result<Box<dyn AirQualitySensor>, DriverError>;
}

/// Real hardware, as far as the enabled cargo features allow.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareSensors;

impl SensorFactory for HardwareSensors {
    fn open_environmental(
        &self,
        config: &EnvironmentConfig,
    ) -> Result<Box<dyn EnvironmentalSensor>, DriverError> {
        match config.driver {
            #[cfg(feature = "bme280")]
            EnvironmentDriver::Bme280 => Ok(Box::new(self::bme280::Bme280Sensor::open(config)?)),
            #[cfg(not(feature = "bme280"))]
            EnvironmentDriver::Bme280 => Err(DriverError::Unavailable("BME280")),
            EnvironmentDriver::Simulated => Ok(Box::new(simulated::SimulatedSensor::default())),
        }
    }

    fn open_air_quality(
        &self,
        config: &BleConfig,
    ) -> Result<Box<dyn AirQualitySensor>, DriverError> {
        #[cfg(feature = "ble")]
        {
            Ok(Box::new(self::ble::BtleSensor::new(config)?))
        }
        #[cfg(not(feature = "ble"))]
        {
            let _ = config;
            Err(DriverError::Unavailable("Bluetooth LE"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DriverError::Read("nack".into()).is_fatal());
        assert!(DriverError::UnsupportedChip(0x55).is_fatal());
        assert!(DriverError::InvalidCharacteristic("x".into()).is_fatal());
        assert!(!DriverError::Timeout(Duration::from_secs(30)).is_fatal());
        assert!(!DriverError::PeripheralNotFound("AA".into()).is_fatal());
        assert!(!DriverError::ShortPayload {
            expected: 12,
            actual: 4
        }
        .is_fatal());
    }

    #[test]
    fn test_simulated_driver_opens() {
        let config = EnvironmentConfig {
            driver: EnvironmentDriver::Simulated,
            ..Default::default()
        };
        let mut sensor = HardwareSensors.open_environmental(&config).unwrap();
        assert_eq!(sensor.model(), "simulated");
        assert!(sensor.sample(true).is_ok());
    }

    #[cfg(not(feature = "ble"))]
    #[test]
    fn test_ble_unavailable_without_feature() {
        let result = HardwareSensors.open_air_quality(&BleConfig::default());
        assert!(matches!(result, Err(DriverError::Unavailable(_))));
    }
}
