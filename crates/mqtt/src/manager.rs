//! Entry point for applications.
//!
//! `MqttManager` validates the configuration, builds the client, starts the
//! connection kernel and the status supervisor, and hands back an
//! `MqttInstance`.
//!
//! ```ignore
//! let instance = MqttManager::from_config(config)?.build_and_start().await?;
//! instance.wait_connected(Duration::from_secs(5)).await?;
//!
//! instance.publish_metric("sensors/node/temperature", "21.50").await?;
//!
//! instance.disconnect().await?;
//! ```

use std::{sync::Arc, time::Duration};

use rumqttc::{AsyncClient, QoS};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use validator::Validate;

use super::{
    backoff::Backoff, client::ClientBuilder, config::Config, connection::ConnectionKernel,
    error::TransferError, state::ConnectionState,
    supervisor::{Announcement, Supervisor},
};

pub struct MqttManager {
    config: Config,
    announcements: Vec<Announcement>,
}

impl MqttManager {
    /// Creates a manager from a configuration section.
    ///
    /// # Errors
    /// `TransferError::ConfigError` when validation fails.
    pub fn from_config(config: Config) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self {
            config,
            announcements: Vec::new(),
        })
    }

    /// Retained messages republished after every successful connect.
    pub fn with_announcements(mut self, announcements: Vec<Announcement>) -> Self {
        self.announcements = announcements;
        self
    }

    /// Builds the client, spawns the connection kernel and the supervisor.
    ///
    /// Returns as soon as the tasks are running. Use
    /// [`MqttInstance::wait_connected`] to wait for the first CONNACK.
    pub async fn build_and_start(self) -> Result<MqttInstance, TransferError> {
        info!(
            "Connecting to {}:{} with base_topic '{}'",
            self.config.host, self.config.port, self.config.base_topic
        );

        let (client, event_loop) = ClientBuilder::from_config(&self.config)?.build()?;

        let connection_cancel = CancellationToken::new();
        let backoff = Backoff::new(
            Duration::from_secs(self.config.reconnect_delay),
            self.config.max_reconnect_attempts,
        );
        let mut kernel =
            ConnectionKernel::new(client.clone(), event_loop, backoff, connection_cancel.clone());
        let state_rx = kernel.subscribe_state();

        let status_topic = self.config.status_topic();
        let supervisor = Supervisor::new(
            status_topic.clone(),
            state_rx.clone(),
            client.clone(),
            connection_cancel.clone(),
        )
        .with_announcements(self.announcements);
        supervisor.monitor().await?;

        let kernel_handle = tokio::spawn(async move {
            let result = kernel.run().await;
            if let Err(e) = &result {
                error!("MQTT connection kernel exited with error: {}", e);
            }
            result
        });

        Ok(MqttInstance {
            client,
            base_topic: self.config.base_topic.clone(),
            status_topic,
            state_rx,
            connection_cancel,
            kernel: Arc::new(Mutex::new(Some(kernel_handle))),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// A running broker connection.
///
/// Cheap to clone; every clone talks to the same event loop.
#[derive(Debug, Clone)]
pub struct MqttInstance {
    client: AsyncClient,

    base_topic: String,

    status_topic: String,

    state_rx: watch::Receiver<ConnectionState>,

    /// Stops the connection kernel (and with it the supervisor).
    connection_cancel: CancellationToken,

    /// Taken by the first `disconnect()`.
    kernel: Arc<Mutex<Option<JoinHandle<Result<(), TransferError>>>>>,
}

impl MqttInstance {
    /// Queues a publish on the event loop.
    ///
    /// Waits only while the request queue is full, not for broker acknowledgement.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransferError> {
        self.client.publish(topic, qos, retain, payload.into()).await?;
        Ok(())
    }

    /// Publishes one metric value: at most once, not retained.
    pub async fn publish_metric(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), TransferError> {
        self.publish(topic, payload, QoS::AtMostOnce, false).await
    }

    /// Waits for the first successful connection.
    ///
    /// # Errors
    /// - `TransferError::InitialConnection` if the kernel gave up
    /// - `TransferError::ConnectTimeout` if nothing happened within `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), TransferError> {
        let mut state_rx = self.state_rx.clone();
        let waited = tokio::time::timeout(
            timeout,
            state_rx.wait_for(|state| {
                state.is_connected() || matches!(state, ConnectionState::Disconnected(_))
            }),
        )
        .await;

        let state = match waited {
            Err(_) => return Err(TransferError::ConnectTimeout(timeout)),
            Ok(Err(_)) => {
                return Err(TransferError::ConnectionKernel(
                    "connection kernel stopped before connecting".into(),
                ))
            }
            Ok(Ok(state)) => state.clone(),
        };

        match state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected(reason) => Err(TransferError::InitialConnection(reason)),
            other => Err(TransferError::ConnectionKernel(format!(
                "unexpected connection state: {other}"
            ))),
        }
    }

    /// Resolves once the connection kernel has given up, with its reason.
    ///
    /// Also resolves after [`MqttInstance::disconnect`], with `"shutdown"`.
    pub async fn wait_stopped(&self) -> String {
        let mut state_rx = self.state_rx.clone();
        let stopped = state_rx
            .wait_for(|state| matches!(state, ConnectionState::Disconnected(_)))
            .await;
        match stopped {
            Ok(state) => match &*state {
                ConnectionState::Disconnected(reason) => reason.clone(),
                other => other.to_string(),
            },
            Err(_) => "connection kernel stopped".into(),
        }
    }

    /// Disconnects cleanly and waits for the connection kernel to finish.
    ///
    /// DISCONNECT is sent only if a session is up, so the broker drops the
    /// last-will. Calling this more than once is a no-op.
    pub async fn disconnect(&self) -> Result<(), TransferError> {
        self.connection_cancel.cancel();

        let handle = self.kernel.lock().await.take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| TransferError::ConnectionKernel(e.to_string()))?,
            None => Ok(()),
        }
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// `<base_topic>/<name>`
    pub fn topic(&self, name: &str) -> String {
        if self.base_topic.is_empty() {
            name.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_topic.trim_end_matches('/'),
                name.trim_start_matches('/')
            )
        }
    }
}
