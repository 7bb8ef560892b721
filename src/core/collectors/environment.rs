//! Temperature, pressure and humidity from a blocking I2C sensor.

use std::{
    sync::{Arc, Mutex, TryLockError},
    time::Duration,
};

use tokio::{task, time::timeout};
use tracing::warn;

use super::{
    error::CollectorError,
    traits::{CollectorResult, DataProducer},
};
use crate::core::{
    drivers::{EnvironmentalSensor, Humidity, RawReading},
    snapshot::EnvironmentSnapshot,
};

pub struct EnvironmentProducer {
    sensor: Arc<Mutex<Box<dyn EnvironmentalSensor>>>,
    name: String,
    sample_timeout: Duration,
    /// Cleared for good the first time the chip reports no humidity.
    humidity_supported: bool,
}

impl EnvironmentProducer {
    pub fn new(sensor: Box<dyn EnvironmentalSensor>, sample_timeout: Duration) -> Self {
        Self {
            name: sensor.model().to_string(),
            sensor: Arc::new(Mutex::new(sensor)),
            sample_timeout,
            humidity_supported: true,
        }
    }

    pub fn humidity_supported(&self) -> bool {
        self.humidity_supported
    }

    /// Runs one driver call on the blocking pool, bounded by `sample_timeout`.
    ///
    /// On timeout the call keeps running and holds the sensor, so later
    /// samples report it busy until it returns.
    async fn sample(&self, with_humidity: bool) -> CollectorResult<RawReading> {
        let sensor = Arc::clone(&self.sensor);
        let name = self.name.clone();

        let call = task::spawn_blocking(move || {
            let mut guard = match sensor.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return Err(CollectorError::SensorBusy(name)),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(CollectorError::SensorPoisoned(name))
                }
            };
            guard.sample(with_humidity).map_err(CollectorError::from)
        });

        match timeout(self.sample_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(CollectorError::Task(join_error.to_string())),
            Err(_) => Err(CollectorError::Timeout {
                sensor: self.name.clone(),
                after: self.sample_timeout,
            }),
        }
    }

    fn humidity_from(&mut self, humidity: Humidity) -> f32 {
        if !self.humidity_supported {
            return 0.0;
        }
        match humidity {
            Humidity::Measured(value) => value,
            Humidity::Unsupported => {
                warn!(
                    "{}: humidity not supported, skipping it from now on and reporting 0",
                    self.name
                );
                self.humidity_supported = false;
                0.0
            }
            Humidity::Skipped => 0.0,
        }
    }
}

#[async_trait::async_trait]
impl DataProducer for EnvironmentProducer {
    type Output = EnvironmentSnapshot;

    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&mut self) -> CollectorResult<EnvironmentSnapshot> {
        let reading = self.sample(self.humidity_supported).await?;
        let humidity = self.humidity_from(reading.humidity);

        Ok(EnvironmentSnapshot {
            temperature: reading.temperature,
            pressure: reading.pressure / 100.0,
            humidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_test::traced_test;

    use super::*;
    use crate::core::drivers::DriverError;

    /// Reports humidity as unsupported on the given call, measured otherwise.
    struct FlakyHumidity {
        calls: Arc<AtomicUsize>,
        requested: Arc<Mutex<Vec<bool>>>,
        unsupported_on: usize,
    }

    impl EnvironmentalSensor for FlakyHumidity {
        fn model(&self) -> &str {
            "fake"
        }

        fn sample(&mut self, with_humidity: bool) -> Result<RawReading, DriverError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(with_humidity);
            let humidity = if n == self.unsupported_on {
                Humidity::Unsupported
            } else {
                // ignores `with_humidity` on purpose
                Humidity::Measured(55.0)
            };
            Ok(RawReading {
                temperature: 20.0,
                pressure: 101_325.0,
                humidity,
            })
        }
    }

    struct Stuck;

    impl EnvironmentalSensor for Stuck {
        fn model(&self) -> &str {
            "stuck"
        }

        fn sample(&mut self, _with_humidity: bool) -> Result<RawReading, DriverError> {
            std::thread::sleep(Duration::from_millis(400));
            Err(DriverError::Read("late".into()))
        }
    }

    struct Broken;

    impl EnvironmentalSensor for Broken {
        fn model(&self) -> &str {
            "broken"
        }

        fn sample(&mut self, _with_humidity: bool) -> Result<RawReading, DriverError> {
            Err(DriverError::Read("remote I/O error".into()))
        }
    }

    #[tokio::test]
    async fn test_pressure_converted_to_hpa() {
        let sensor = FlakyHumidity {
            calls: Arc::default(),
            requested: Arc::default(),
            unsupported_on: usize::MAX,
        };
        let mut producer = EnvironmentProducer::new(Box::new(sensor), Duration::from_secs(1));

        let snapshot = producer.produce().await.unwrap();
        assert_eq!(snapshot.temperature, 20.0);
        assert_eq!(snapshot.pressure, 1013.25);
        assert_eq!(snapshot.humidity, 55.0);
        assert_eq!(producer.name(), "fake");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_humidity_latch_never_reverts() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let sensor = FlakyHumidity {
            calls: Arc::default(),
            requested: Arc::clone(&requested),
            unsupported_on: 1,
        };
        let mut producer = EnvironmentProducer::new(Box::new(sensor), Duration::from_secs(1));

        assert_eq!(producer.produce().await.unwrap().humidity, 55.0);
        assert!(producer.humidity_supported());

        for _ in 0..5 {
            assert_eq!(producer.produce().await.unwrap().humidity, 0.0);
        }
        assert!(!producer.humidity_supported());
        assert_eq!(*requested.lock().unwrap(), [true, true, false, false, false, false]);

        assert!(logs_contain("humidity not supported"));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|l| l.contains("humidity not supported"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one degradation warning, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_stuck_driver_times_out_then_reports_busy() {
        let mut producer = EnvironmentProducer::new(Box::new(Stuck), Duration::from_millis(50));

        let first = producer.produce().await.unwrap_err();
        assert!(matches!(first, CollectorError::Timeout { .. }));
        assert!(!first.is_fatal());

        let second = producer.produce().await.unwrap_err();
        assert!(matches!(second, CollectorError::SensorBusy(_)));
        assert!(!second.is_fatal());
    }

    #[tokio::test]
    async fn test_bus_read_failure_is_fatal() {
        let mut producer = EnvironmentProducer::new(Box::new(Broken), Duration::from_secs(1));
        let err = producer.produce().await.unwrap_err();
        assert!(matches!(err, CollectorError::Driver(DriverError::Read(_))));
        assert!(err.is_fatal());
    }
}
