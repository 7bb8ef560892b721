//! Collector/publisher pairs and their lifecycle.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    collectors::{
        AirQualityProducer, Collector, CollectorError, CollectorResult, DataProducer,
        EnvironmentProducer,
    },
    drivers::{DriverError, SensorFactory},
    handoff,
    publisher::{Publisher, PublisherTask},
};
use crate::config::sensors::SensorsConfig;

/// Owns every collector and publisher task and the token that stops them.
pub struct Pipeline {
    tasks: JoinSet<(String, CollectorResult<()>)>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            cancel,
        }
    }

    /// Starts one collector and its publisher, linked by a rendezvous hand-off.
    pub fn spawn_pair<P: DataProducer>(
        &mut self,
        producer: P,
        interval: Duration,
        publisher: Arc<dyn Publisher>,
        topic_prefix: &str,
    ) {
        let name = producer.name().to_string();
        let (tx, rx) = handoff::channel();

        let collector = Collector::new(producer, interval, tx, self.cancel.clone());
        let relay = PublisherTask::new(name.clone(), rx, publisher, topic_prefix, self.cancel.clone());

        let collector_name = format!("{name} collector");
        self.tasks
            .spawn(async move { (collector_name, collector.run().await) });
        let publisher_name = format!("{name} publisher");
        self.tasks
            .spawn(async move { (publisher_name, relay.run().await) });
    }

    /// Opens the configured sensors and starts a pair for each.
    ///
    /// The air-quality pair only runs when a BLE device address is set.
    /// Returns how many pairs were started.
    pub fn spawn_sensors(
        &mut self,
        sensors: &SensorsConfig,
        factory: &dyn SensorFactory,
        publisher: Arc<dyn Publisher>,
        topic_prefix: &str,
    ) -> Result<usize, DriverError> {
        let mut started = 0;

        if sensors.environment.enabled {
            let sensor = factory.open_environmental(&sensors.environment)?;
            info!(
                "Environmental sensor: {} (every {:?})",
                sensor.model(),
                sensors.measure_interval()
            );
            self.spawn_pair(
                EnvironmentProducer::new(sensor, sensors.sample_timeout()),
                sensors.measure_interval(),
                Arc::clone(&publisher),
                topic_prefix,
            );
            started += 1;
        } else {
            info!("Environmental sensor disabled");
        }

        if sensors.ble.is_enabled() {
            let sensor = factory.open_air_quality(&sensors.ble)?;
            info!(
                "Air quality sensor: {} (every {:?})",
                sensors.ble.device_address,
                sensors.ble.measure_interval()
            );
            self.spawn_pair(
                AirQualityProducer::new(sensor),
                sensors.ble.measure_interval(),
                publisher,
                topic_prefix,
            );
            started += 1;
        } else {
            info!("No BLE device address configured, air quality pipeline disabled");
        }

        Ok(started)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolves with the first fatal task error. Pends forever otherwise.
    ///
    /// Cancel-safe, so it can sit in a `select!` next to the signal listener.
    pub async fn wait_fatal(&mut self) -> CollectorError {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => debug!("{} finished", name),
                Ok((name, Err(e))) => {
                    debug!("{} returned an error", name);
                    return e;
                }
                Err(e) => return CollectorError::Task(e.to_string()),
            }
        }
        std::future::pending().await
    }

    /// Cancels every task and waits up to `grace` for them to finish.
    ///
    /// Tasks still running afterwards are aborted. Returns true if all of
    /// them stopped in time.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        self.cancel.cancel();

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => debug!("{} stopped", name),
                    Ok((name, Err(e))) => warn!("{} stopped with error: {}", name, e),
                    Err(e) => warn!("Task failed during shutdown: {}", e),
                }
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                "{} task(s) still running after {:?}, aborting",
                self.tasks.len(),
                grace
            );
            self.tasks.shutdown().await;
        }
        drained
    }
}
