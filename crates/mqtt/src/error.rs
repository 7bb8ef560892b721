//! Error handling for the broker connection.
//!
//! `TransferError` is the single error type returned by this crate. It folds
//! together configuration problems, client queueing failures, connection
//! failures and retry exhaustion so the application can decide between
//! "log and continue" and "abort the process".
//!
//! # Error Categories
//!
//! **Startup errors** (fail fast):
//! - `ClientSetup`: the client could not be built (bad TLS files, etc.)
//! - `ConfigError`: validation of the broker settings failed
//! - `InitialConnection`: the broker could not be reached before the first CONNACK
//!
//! **Runtime errors**:
//! - `ClientTransfer`: a publish could not be queued to the event loop
//! - `ClientConnection`: network-level failure reported by the event loop
//! - `RetriesPolicy`: the configured reconnect limit was exhausted

use thiserror::Error;

/// The unified error type for broker operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// MQTT client initialization failed.
    ///
    /// Usually a TLS file that cannot be read or an invalid TLS layout.
    /// The application won't start; catch at startup and fail fast.
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// The connection kernel stopped or never started.
    #[error("Connection kernel error: {0}")]
    ConnectionKernel(String),

    /// The broker could not be reached before the first successful CONNACK.
    ///
    /// This is never retried: a device that cannot reach its broker at boot
    /// is misconfigured, not temporarily offline.
    #[error("Initial connection failed: {0}")]
    InitialConnection(String),

    /// Waiting for the first connection exceeded the configured deadline.
    #[error("Timed out after {0:?} waiting for the broker connection")]
    ConnectTimeout(std::time::Duration),

    /// Broker settings failed validation.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// MQTT client failed to hand a request to the event loop.
    ///
    /// Typically the event loop has already been shut down.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// MQTT connection to broker failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// Reconnect attempts exhausted.
    #[error("Retry policy error: {0}")]
    RetriesPolicy(#[from] super::backoff::BackoffError),

    /// I/O operation failed (TLS certificate loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxes the (large) connection error on conversion.
impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        TransferError::ClientConnection(Box::new(err))
    }
}
