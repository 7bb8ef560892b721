//! Relays snapshots to the broker, one message per metric.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{collectors::CollectorResult, handoff::HandoffReceiver, snapshot::Snapshot};

/// Destination for metric payloads.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Metrics go out at QoS 0, not retained.
#[async_trait::async_trait]
impl Publisher for sensor_mqtt_broker::MqttInstance {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sensor_mqtt_broker::MqttInstance::publish_metric(self, topic, payload)
            .await
            .map_err(|e| Box::new(e) as _)
    }
}

pub struct PublisherTask<S: Snapshot> {
    name: String,
    input: HandoffReceiver<S>,
    publisher: Arc<dyn Publisher>,
    topic_prefix: String,
    cancel: CancellationToken,
}

impl<S: Snapshot> PublisherTask<S> {
    pub fn new(
        name: impl Into<String>,
        input: HandoffReceiver<S>,
        publisher: Arc<dyn Publisher>,
        topic_prefix: &str,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            publisher,
            topic_prefix: topic_prefix.trim_end_matches('/').to_string(),
            cancel,
        }
    }

    /// Publishes snapshots until cancelled or the collector is gone.
    ///
    /// A snapshot still queued at cancellation is discarded. One already
    /// being published is finished first.
    pub async fn run(mut self) -> CollectorResult<()> {
        info!("{} publisher loop started", self.name);

        loop {
            let snapshot = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Request to exit {} publisher loop", self.name);
                    break;
                }
                received = self.input.recv() => match received {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };
            self.publish_snapshot(snapshot).await;
        }

        info!("Exiting {} publisher loop", self.name);
        Ok(())
    }

    /// Every metric in order; a failed publish is logged and the rest still go out.
    async fn publish_snapshot(&self, snapshot: S) {
        let metrics = snapshot.metrics();
        drop(snapshot);
        for metric in metrics {
            let topic = format!("{}/{}", self.topic_prefix, metric.name);
            let payload = metric.payload();
            match self.publisher.publish(&topic, &payload).await {
                Ok(()) => debug!("Published {} = {}", topic, payload),
                Err(e) => error!("Error publishing {} to {}: {}", metric.name, topic, e),
            }
        }
    }
}
