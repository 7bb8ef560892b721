//! Hardware-free environmental sensor.

use super::{DriverError, EnvironmentalSensor, Humidity, RawReading};

/// Produces slowly drifting, deterministic values.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    step: u32,
}

impl SimulatedSensor {
    fn phase(&self) -> f32 {
        // one full cycle every 360 samples
        (self.step % 360) as f32 * std::f32::consts::TAU / 360.0
    }
}

impl EnvironmentalSensor for SimulatedSensor {
    fn model(&self) -> &str {
        "simulated"
    }

    fn sample(&mut self, with_humidity: bool) -> Result<RawReading, DriverError> {
        let phase = self.phase();
        self.step = self.step.wrapping_add(1);

        Ok(RawReading {
            temperature: 21.0 + 2.5 * phase.sin(),
            pressure: 101_325.0 + 350.0 * phase.cos(),
            humidity: if with_humidity {
                Humidity::Measured(45.0 + 10.0 * phase.sin())
            } else {
                Humidity::Skipped
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_baseline() {
        let mut sensor = SimulatedSensor::default();
        let reading = sensor.sample(true).unwrap();
        assert_eq!(reading.temperature, 21.0);
        assert_eq!(reading.pressure, 101_675.0);
        assert_eq!(reading.humidity, Humidity::Measured(45.0));
    }

    #[test]
    fn test_values_drift_and_stay_plausible() {
        let mut sensor = SimulatedSensor::default();
        let first = sensor.sample(true).unwrap();
        let second = sensor.sample(true).unwrap();
        assert_ne!(first.temperature, second.temperature);

        for _ in 0..400 {
            let r = sensor.sample(true).unwrap();
            assert!((18.0..=24.0).contains(&r.temperature));
            assert!((100_900.0..=101_700.0).contains(&r.pressure));
        }
    }

    #[test]
    fn test_humidity_skipped_when_not_requested() {
        let mut sensor = SimulatedSensor::default();
        assert_eq!(sensor.sample(false).unwrap().humidity, Humidity::Skipped);
    }
}
