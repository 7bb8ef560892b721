//! Measurement snapshots and the metrics they publish.

/// One named value of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metric {
    /// Last topic segment, e.g. `temperature`.
    pub name: &'static str,
    pub value: f32,
}

impl Metric {
    pub const fn new(name: &'static str, value: f32) -> Self {
        Self { name, value }
    }

    /// Wire payload: ASCII decimal with two fractional digits.
    pub fn payload(&self) -> String {
        format!("{:.2}", self.value)
    }
}

/// A reading that can be handed from a collector to its publisher.
pub trait Snapshot: Send + 'static {
    /// Metrics to publish, always in the same order.
    fn metrics(&self) -> Vec<Metric>;
}

/// Temperature, pressure and humidity from the I2C sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentSnapshot {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Hectopascals.
    pub pressure: f32,
    /// Percent relative humidity, 0 once humidity is known to be unsupported.
    pub humidity: f32,
}

impl Snapshot for EnvironmentSnapshot {
    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("temperature", self.temperature),
            Metric::new("pressure", self.pressure),
            Metric::new("humidity", self.humidity),
        ]
    }
}

/// Decoded Airthings Wave reading.
///
/// Only the radon values are published. Temperature, pressure and humidity
/// would land on the same topics as the I2C sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AirQualitySnapshot {
    pub temperature: f32,
    pub pressure: f32,
    pub humidity: f32,
    /// Bq/m³, 24 hour average.
    pub radon_short: f32,
    /// Bq/m³, long term average.
    pub radon_long: f32,
}

impl Snapshot for AirQualitySnapshot {
    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("radon_short", self.radon_short),
            Metric::new("radon_long", self.radon_long),
        ]
    }
}
