//! # sensor-mqtt-broker: one long-lived MQTT connection for a sensor node
//!
//! Built on `rumqttc`. Adds to it:
//!
//! - a retained `online`/`offline` status on `<base_topic>/status`, the
//!   `offline` half being the last-will
//! - fixed-delay reconnect once the first connection succeeded, and a hard
//!   failure when the broker cannot be reached at startup
//! - a clean DISCONNECT on shutdown so the last-will only fires on abnormal loss
//! - connection state broadcast over a `watch` channel
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use sensor_mqtt_broker::{Config, MqttManager};
//!
//! #[tokio::main]
//! async fn main() -> sensor_mqtt_broker::Result<()> {
//!     let config = Config {
//!         base_topic: "sensors/node-1".into(),
//!         client_id: "node-1_sensor_mqtt".into(),
//!         ..Default::default()
//!     };
//!
//!     let instance = MqttManager::from_config(config)?.build_and_start().await?;
//!     instance.wait_connected(Duration::from_secs(5)).await?;
//!
//!     instance
//!         .publish_metric(&instance.topic("temperature"), "21.50")
//!         .await?;
//!
//!     instance.disconnect().await
//! }
//! ```
//!
//! # State Monitoring
//!
//! ```ignore
//! let mut state_rx = instance.state_receiver();
//! while state_rx.changed().await.is_ok() {
//!     match &*state_rx.borrow() {
//!         ConnectionState::Connected => println!("Online"),
//!         ConnectionState::Reconnecting(secs) => println!("Reconnecting in {secs}s"),
//!         ConnectionState::Disconnected(reason) => println!("Offline: {reason}"),
//!         ConnectionState::Connecting => {}
//!     }
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod state;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_broker;

pub use backoff::{Backoff, BackoffError};
pub use client::{ClientBuilder, STATUS_OFFLINE, STATUS_ONLINE};
pub use config::{Config, TlsConfig};
pub use connection::ConnectionKernel;
pub use error::TransferError;
pub use manager::{MqttInstance, MqttManager};
// Re-exported so callers can pick a delivery level without depending on rumqttc.
pub use rumqttc::QoS;
pub use state::ConnectionState;
pub use supervisor::{Announcement, Supervisor};

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, TransferError>;
