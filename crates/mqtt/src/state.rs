//! Connection state tracking for the broker connection.
//!
//! The connection kernel publishes every transition on a `watch` channel so
//! that the supervisor (status messages) and the application (startup wait)
//! can react without polling.

use std::fmt;

/// Represents the current state of the broker connection.
///
/// The lifecycle flows through these states:
/// - `Connecting` -> `Connected` (CONNACK received)
/// - `Connected` -> `Reconnecting` (transient loss, fixed delay before retry)
/// - `Reconnecting` -> `Connected` (next CONNACK)
/// - any -> `Disconnected` (fatal error, retries exhausted, or clean shutdown)
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Sending CONNECT and waiting for CONNACK.
    Connecting,

    /// Connected with an active keep-alive. Publishes go straight out.
    Connected,

    /// The connection is gone and the kernel will not bring it back.
    ///
    /// Carries the reason (broker error, retry exhaustion, "shutdown").
    Disconnected(String),

    /// Waiting the fixed backoff before the next attempt.
    ///
    /// The `f64` field is the delay in seconds.
    Reconnecting(f64),
}

impl ConnectionState {
    /// Short static name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected(_) => "Disconnected",
            ConnectionState::Reconnecting(_) => "Reconnecting",
        }
    }

    /// Contextual details: the disconnect reason or the reconnect delay.
    pub fn details(&self) -> String {
        match self {
            ConnectionState::Connecting => String::new(),
            ConnectionState::Connected => String::new(),
            ConnectionState::Disconnected(reason) => reason.clone(),
            ConnectionState::Reconnecting(seconds) => format!("in {seconds} seconds"),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting(_)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        let details = self.details();
        if !details.is_empty() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}
