//! Radon and climate values from a BLE air-quality monitor.

use super::traits::{CollectorResult, DataProducer};
use crate::core::{
    drivers::{airthings, AirQualitySensor},
    snapshot::AirQualitySnapshot,
};

pub struct AirQualityProducer {
    sensor: Box<dyn AirQualitySensor>,
}

impl AirQualityProducer {
    pub fn new(sensor: Box<dyn AirQualitySensor>) -> Self {
        Self { sensor }
    }
}

#[async_trait::async_trait]
impl DataProducer for AirQualityProducer {
    type Output = AirQualitySnapshot;

    fn name(&self) -> &str {
        "Airthings Wave"
    }

    async fn produce(&mut self) -> CollectorResult<AirQualitySnapshot> {
        let raw = self.sensor.read_current_values().await?;
        Ok(airthings::decode(&raw)?)
    }
}
