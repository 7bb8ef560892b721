//! Event loop driver with fixed-delay reconnect and clean disconnect.
//!
//! `ConnectionKernel` owns rumqttc's `EventLoop` and is the only task that
//! polls it. It broadcasts every `ConnectionState` transition on a `watch`
//! channel.
//!
//! ```text
//! MqttInstance / Supervisor (AsyncClient handles)
//!     ↓ requests
//! ConnectionKernel (polls EventLoop, reconnects, disconnects)
//!     ↓
//! Network (TCP/TLS)
//! ```
//!
//! Failure policy:
//! - any error before the first CONNACK ends the kernel with
//!   `TransferError::InitialConnection`;
//! - after that, fatal errors (TLS, refused credentials, local I/O setup) end
//!   the kernel, everything else waits the fixed reconnect delay and polls
//!   again, which makes rumqttc reconnect.
//!
//! On cancellation the kernel queues DISCONNECT and keeps polling until the
//! packet is on the wire, so the broker discards the last-will.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{backoff::Backoff, error::TransferError, state::ConnectionState};

/// Upper bound for flushing DISCONNECT during shutdown.
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Drives the MQTT event loop for the lifetime of the process.
pub struct ConnectionKernel {
    /// Client handle, used here only to queue DISCONNECT.
    client: AsyncClient,

    event_loop: EventLoop,

    /// Fixed-delay policy applied after a lost connection.
    backoff: Backoff,

    cancel: CancellationToken,

    /// A CONNACK was received at least once.
    ever_connected: bool,

    /// The current network session is up.
    connected: bool,

    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionKernel {
    pub fn new(
        client: AsyncClient,
        event_loop: EventLoop,
        backoff: Backoff,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            client,
            event_loop,
            backoff,
            cancel,
            ever_connected: false,
            connected: false,
            state_tx,
        }
    }

    /// Subscribes to connection state changes.
    ///
    /// The receiver sees the current state immediately.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Stores the new state and notifies subscribers if it changed.
    fn update_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state.clone();
            true
        });

        if changed {
            info!("Connection state changed to: {}", state);
        }
    }

    /// Runs until cancellation or an unrecoverable error.
    ///
    /// # Returns
    /// - `Ok(())`: cancelled; DISCONNECT was attempted if a session was up
    /// - `Err(TransferError::InitialConnection)`: the broker was never reached
    /// - `Err(_)`: fatal error or reconnect limit exhausted after having connected
    pub async fn run(&mut self) -> Result<(), TransferError> {
        self.update_state(ConnectionState::Connecting);
        info!("Starting connection event loop...");

        loop {
            let polled = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received, disconnecting from broker");
                    self.disconnect().await;
                    self.update_state(ConnectionState::Disconnected("shutdown".into()));
                    return Ok(());
                }

                polled = self.event_loop.poll() => polled,
            };

            match polled {
                Ok(event) => self.handle_event(event),
                Err(e) => {
                    let delay = self.on_connection_error(e)?;
                    self.update_state(ConnectionState::Reconnecting(delay.as_secs_f64()));

                    tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => {
                            info!("Shutdown requested while waiting to reconnect");
                            self.update_state(ConnectionState::Disconnected("shutdown".into()));
                            return Ok(());
                        }

                        _ = tokio::time::sleep(delay) => {}
                    }

                    self.update_state(ConnectionState::Connecting);
                }
            }
        }
    }

    /// Decides whether an event loop error ends the kernel.
    ///
    /// Returns the delay to wait before the next attempt.
    fn on_connection_error(&mut self, err: ConnectionError) -> Result<Duration, TransferError> {
        self.connected = false;
        let reason = get_error_message(&err);

        if !self.ever_connected {
            error!("Could not connect to broker: {}", reason);
            self.update_state(ConnectionState::Disconnected(reason.clone()));
            return Err(TransferError::InitialConnection(reason));
        }

        if is_fatal_error(&err) {
            error!("Fatal connection error, giving up: {}", reason);
            debug!("Fatal connection error details: {:?}", err);
            self.update_state(ConnectionState::Disconnected(reason));
            return Err(TransferError::from(err));
        }

        match self.backoff.next_sleep() {
            Ok(delay) => {
                warn!(
                    "Connection lost ({}), reconnecting in {:.2} seconds",
                    reason,
                    delay.as_secs_f64()
                );
                Ok(delay)
            }
            Err(backoff_err) => {
                error!("Maximum reconnect attempts exceeded: {}", backoff_err);
                self.update_state(ConnectionState::Disconnected(backoff_err.to_string()));
                Err(backoff_err.into())
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(conn_ack)) => {
                if conn_ack.code == ConnectReturnCode::Success {
                    info!("Connection established successfully.");
                    self.ever_connected = true;
                    self.connected = true;
                    self.backoff.reset();
                    self.update_state(ConnectionState::Connected);
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("Disconnected by broker");
            }
            Event::Incoming(packet) => {
                trace!("Incoming packet: {:?}", packet);
            }
            Event::Outgoing(outgoing) => {
                trace!("Outgoing packet: {:?}", outgoing);
            }
        }
    }

    /// Queues DISCONNECT and polls until it has been written.
    ///
    /// Without a live session there is nothing to flush and the broker
    /// already decided about the last-will.
    async fn disconnect(&mut self) {
        if !self.connected {
            debug!("No active session, skipping DISCONNECT");
            return;
        }

        if let Err(e) = self.client.try_disconnect() {
            warn!("Error queueing disconnect packet: {:?}", e);
            return;
        }

        let event_loop = &mut self.event_loop;
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                    Ok(event) => trace!("Draining before disconnect: {:?}", event),
                    Err(e) => {
                        debug!("Event loop ended before DISCONNECT was flushed: {}", e);
                        return false;
                    }
                }
            }
        })
        .await;

        self.connected = false;
        match flushed {
            Ok(true) => info!("Disconnected from broker cleanly"),
            Ok(false) | Err(_) => {
                warn!("DISCONNECT was not flushed, the broker may publish the last will")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    // Retrying cannot help
    Fatal,
    // Temporary, worth another attempt
    Reconnect,
}

fn classify_connection_error(err: &ConnectionError) -> Disposition {
    use Disposition::*;

    match err {
        // Certificates or crypto setup
        ConnectionError::Tls(_) => Fatal,

        // Broker answered CONNECT with something else
        ConnectionError::NotConnAck(_) => Fatal,

        // Session-level failures: peer closed the socket, missed PINGRESP,
        // undecodable frame. rumqttc starts a fresh session on the next poll.
        ConnectionError::MqttState(_) => Reconnect,

        // Every client handle is gone
        ConnectionError::RequestsDone => Fatal,

        ConnectionError::Io(e) => match e.kind() {
            // Local misconfiguration
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::InvalidData => Fatal,

            _ => Reconnect,
        },

        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => Reconnect,

        ConnectionError::ConnectionRefused(code) => match code {
            ConnectReturnCode::RefusedProtocolVersion
            | ConnectReturnCode::BadClientId
            | ConnectReturnCode::BadUserNamePassword
            | ConnectReturnCode::NotAuthorized => Fatal,

            _ => Reconnect,
        },

        #[allow(unreachable_patterns)]
        _ => Reconnect,
    }
}

fn is_fatal_error(err: &ConnectionError) -> bool {
    matches!(classify_connection_error(err), Disposition::Fatal)
}

/// Innermost message of an error chain, without surrounding quotes.
fn get_error_message(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
