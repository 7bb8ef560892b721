//! Status announcements driven by connection state.
//!
//! The `Supervisor` watches the kernel's state channel and publishes the
//! retained `online` status every time a session comes up. The matching
//! `offline` is never published by us: it is the last-will, sent by the broker
//! only when the connection ends without DISCONNECT.
//!
//! Announcements (retained configuration such as discovery records) follow the
//! status on each connect, so a broker that lost its retained store gets them
//! back.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{client::STATUS_ONLINE, error::TransferError, state::ConnectionState};

/// A retained message republished after every connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    state_rx: watch::Receiver<ConnectionState>,

    /// `<base_topic>/status`
    status_topic: String,

    client: AsyncClient,

    announcements: Arc<[Announcement]>,

    cancel_token: CancellationToken,
}

impl Supervisor {
    pub fn new(
        status_topic: impl Into<String>,
        state_rx: watch::Receiver<ConnectionState>,
        client: AsyncClient,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            status_topic: status_topic.into(),
            state_rx,
            client,
            announcements: Arc::from([]),
            cancel_token,
        }
    }

    pub fn with_announcements(mut self, announcements: Vec<Announcement>) -> Self {
        self.announcements = announcements.into();
        self
    }

    /// Publishes the retained "online" status (QoS 1).
    async fn publish_online_status(&self) -> Result<(), TransferError> {
        self.client
            .publish(
                self.status_topic.as_str(),
                QoS::AtLeastOnce,
                true,
                STATUS_ONLINE.as_bytes().to_vec(),
            )
            .await?;
        info!("Published online status to {}", self.status_topic);
        Ok(())
    }

    async fn publish_announcements(&self) -> Result<(), TransferError> {
        for announcement in self.announcements.iter() {
            self.client
                .publish(
                    announcement.topic.as_str(),
                    QoS::AtLeastOnce,
                    true,
                    announcement.payload.as_bytes().to_vec(),
                )
                .await?;
            debug!("Published announcement to {}", announcement.topic);
        }
        Ok(())
    }

    async fn on_connect(&self) {
        if let Err(e) = self.publish_online_status().await {
            warn!("Failed to publish online status: {}", e);
        }
        if self.announcements.is_empty() {
            return;
        }
        match self.publish_announcements().await {
            Ok(()) => info!("Published {} announcements", self.announcements.len()),
            Err(e) => warn!("Failed to publish announcements: {}", e),
        }
    }

    /// Spawns the monitoring loop and returns immediately.
    ///
    /// A session that is already up when this is called is announced right away.
    pub async fn monitor(&self) -> Result<(), TransferError> {
        let mut state_rx = self.state_rx.clone();

        if state_rx.borrow_and_update().is_connected() {
            info!("Already connected when supervisor started");
            self.on_connect().await;
        }

        tokio::spawn({
            let supervisor = self.clone();
            let cancel = self.cancel_token.clone();
            async move {
                supervisor.run_monitor_loop(state_rx, cancel).await;
            }
        });

        Ok(())
    }

    async fn run_monitor_loop(
        &self,
        mut state_rx: watch::Receiver<ConnectionState>,
        cancel: CancellationToken,
    ) {
        info!("Supervisor monitoring started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Supervisor shutting down due to cancellation");
                    break;
                }

                changed = state_rx.changed() => {
                    if changed.is_err() {
                        info!("Connection kernel stopped, supervisor exiting");
                        break;
                    }

                    let state = state_rx.borrow_and_update().clone();
                    match state {
                        ConnectionState::Connected => self.on_connect().await,
                        ConnectionState::Disconnected(reason) => {
                            warn!("Disconnected: {}", reason);
                        }
                        ConnectionState::Reconnecting(seconds) => {
                            warn!("Broker connection lost, retrying in {} seconds", seconds);
                        }
                        ConnectionState::Connecting => {}
                    }
                }
            }
        }

        info!("Supervisor monitoring stopped");
    }
}
