//! Bosch BME280 / BMP280 on a Linux I2C bus.

use ::bme280::i2c::BME280;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};
use tracing::info;

use super::{DriverError, EnvironmentalSensor, Humidity, RawReading};
use crate::config::sensors::{EnvironmentConfig, BME280_SECONDARY_ADDRESS};

const CHIP_ID_REGISTER: u8 = 0xD0;
const BME280_CHIP_ID: u8 = 0x60;
const BMP280_CHIP_ID: u8 = 0x58;

/// Chip family found behind the configured address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Bme280,
    /// No humidity sensor.
    Bmp280,
}

impl Chip {
    pub fn name(self) -> &'static str {
        match self {
            Chip::Bme280 => "BME280",
            Chip::Bmp280 => "BMP280",
        }
    }
}

/// Reads the chip id register and maps it to a supported chip.
pub fn probe_chip<B: I2c>(bus: &mut B, address: u8) -> Result<Chip, DriverError> {
    let mut id = [0u8; 1];
    bus.write_read(address, &[CHIP_ID_REGISTER], &mut id)
        .map_err(|e| DriverError::Probe {
            address,
            reason: format!("{e:?}"),
        })?;

    match id[0] {
        BME280_CHIP_ID => Ok(Chip::Bme280),
        BMP280_CHIP_ID => Ok(Chip::Bmp280),
        other => Err(DriverError::UnsupportedChip(other)),
    }
}

pub struct Bme280Sensor {
    device: BME280<I2cdev>,
    delay: Delay,
    chip: Chip,
}

impl Bme280Sensor {
    /// Opens the bus, identifies the chip and loads its calibration data.
    pub fn open(config: &EnvironmentConfig) -> Result<Self, DriverError> {
        let path = config.i2c_bus_path();
        let address = config.i2c_device_address;

        let mut bus = I2cdev::new(&path).map_err(|e| DriverError::Bus {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let chip = probe_chip(&mut bus, address)?;

        let mut device = if address == BME280_SECONDARY_ADDRESS {
            BME280::new_secondary(bus)
        } else {
            BME280::new_primary(bus)
        };
        let mut delay = Delay;
        device.init(&mut delay).map_err(|e| DriverError::Probe {
            address,
            reason: format!("{e:?}"),
        })?;

        info!("{} ready on {} at 0x{:02x}", chip.name(), path, address);
        Ok(Self {
            device,
            delay,
            chip,
        })
    }
}

impl EnvironmentalSensor for Bme280Sensor {
    fn model(&self) -> &str {
        self.chip.name()
    }

    fn sample(&mut self, with_humidity: bool) -> Result<RawReading, DriverError> {
        let measurements = self
            .device
            .measure(&mut self.delay)
            .map_err(|e| DriverError::Read(format!("{e:?}")))?;

        let humidity = match (self.chip, with_humidity) {
            (Chip::Bmp280, _) => Humidity::Unsupported,
            (Chip::Bme280, true) => Humidity::Measured(measurements.humidity),
            (Chip::Bme280, false) => Humidity::Skipped,
        };

        Ok(RawReading {
            temperature: measurements.temperature,
            pressure: measurements.pressure,
            humidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    use super::*;

    /// Answers every read with `id`, or fails every transaction.
    struct FakeBus {
        id: Option<u8>,
        last_write: Vec<u8>,
        last_address: u8,
    }

    impl FakeBus {
        fn answering(id: u8) -> Self {
            Self {
                id: Some(id),
                last_write: Vec::new(),
                last_address: 0,
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let id = self.id.ok_or(ErrorKind::Bus)?;
            self.last_address = address;
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.last_write = bytes.to_vec(),
                    Operation::Read(buf) => buf.fill(id),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_probe_reads_chip_id_register() {
        let mut bus = FakeBus::answering(BME280_CHIP_ID);
        assert_eq!(probe_chip(&mut bus, 0x77).unwrap(), Chip::Bme280);
        assert_eq!(bus.last_write, [CHIP_ID_REGISTER]);
        assert_eq!(bus.last_address, 0x77);
    }

    #[test]
    fn test_probe_detects_bmp280() {
        let mut bus = FakeBus::answering(BMP280_CHIP_ID);
        assert_eq!(probe_chip(&mut bus, 0x76).unwrap(), Chip::Bmp280);
    }

    #[test]
    fn test_probe_rejects_unknown_chip() {
        let mut bus = FakeBus::answering(0x55);
        let err = probe_chip(&mut bus, 0x76).unwrap_err();
        assert!(matches!(err, DriverError::UnsupportedChip(0x55)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_probe_bus_failure_is_fatal() {
        let mut bus = FakeBus {
            id: None,
            last_write: Vec::new(),
            last_address: 0,
        };
        let err = probe_chip(&mut bus, 0x76).unwrap_err();
        assert!(matches!(err, DriverError::Probe { address: 0x76, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_bus_is_fatal() {
        let config = EnvironmentConfig {
            i2c_bus_id: 250,
            ..Default::default()
        };
        let err = Bme280Sensor::open(&config).err().unwrap();
        assert!(matches!(err, DriverError::Bus { .. }));
        assert!(err.is_fatal());
    }
}
