//! Broker connection settings.
//!
//! Loaded as the `[transport]` section of the application configuration and
//! validated with `validator` before any socket is opened.
//!
//! ```toml
//! [transport]
//! host = "mqtt"
//! port = 1883
//! username = "sensor_mqtt"
//! password = "password"
//! keep_alive = 2
//! connection_timeout = 1
//! reconnect_delay = 1
//!
//! [transport.tls]
//! ca_cert_path = "/etc/sensor_mqtt/ca.pem"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Main broker connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Topic namespace for everything this client publishes.
    ///
    /// The status topic is `<base_topic>/status` and each metric lands on
    /// `<base_topic>/<metric>`. Left empty, the application fills it with
    /// `sensors/<hostname>`.
    #[validate(
        length(max = 255, message = "Base topic must not exceed 255 characters"),
        custom(function = "validate_topic", message = "Base topic must not contain wildcards")
    )]
    pub base_topic: String,

    /// Broker hostname or IP address. Resolved at connect time.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port number.
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Username sent in CONNECT. No credentials are sent when unset.
    pub username: Option<String>,

    /// Password sent in CONNECT together with `username`.
    pub password: Option<String>,

    /// Client identifier.
    ///
    /// Empty means "derive one": the application uses `<hostname>_sensor_mqtt`
    /// and the builder falls back to a random UUID.
    #[validate(length(max = 64, message = "Client ID must not exceed 64 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    ///
    /// rumqttc sends PINGREQ after this much idle time and treats a missing
    /// PINGRESP as a lost connection, so this also bounds ping latency.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Keep alive must be between 1 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Seconds allowed for TCP connect, TLS handshake and CONNACK.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Fixed delay in seconds between reconnect attempts after a lost connection.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Reconnect delay must be between 1 and 300 seconds"
    ))]
    pub reconnect_delay: u64,

    /// Consecutive failed reconnects before giving up. `0` retries forever.
    #[validate(range(
        max = 10000,
        message = "Max reconnect attempts must be between 0 and 10000"
    ))]
    pub max_reconnect_attempts: u32,

    /// Request a clean session from the broker.
    pub clean_session: bool,

    /// Maximum number of QoS 1/2 publishes awaiting acknowledgement.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    /// Maximum MQTT packet size in bytes, applied in both directions.
    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u16>,

    /// Capacity of the client-to-event-loop request queue.
    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,

    /// TLS transport. Plain TCP when absent.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,
}

impl Config {
    /// Topic carrying the retained online/offline status.
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.base_topic.trim_end_matches('/'))
    }
}

impl Default for Config {
    /// Settings of a stock sensor node: plain TCP to the `mqtt` host with a
    /// short keep-alive so the broker notices a dead node within seconds.
    fn default() -> Self {
        Config {
            base_topic: String::new(),
            host: "mqtt".to_string(),
            port: 1883,
            username: Some("sensor_mqtt".to_string()),
            password: Some("password".to_string()),
            client_id: String::new(),
            keep_alive: 2,
            connection_timeout: 1,
            reconnect_delay: 1,
            max_reconnect_attempts: 0,
            clean_session: true,
            max_inflight: 10,
            max_packet_size: Some(65_535),
            request_channel_capacity: Some(10),
            tls: None,
        }
    }
}

/// TLS configuration for secure broker connections.
///
/// Certificate files are read when `ClientBuilder::build()` runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TlsConfig {
    /// CA certificate (PEM) used to verify the broker.
    #[serde(default)]
    #[validate(custom(
        function = "validate_optional_file_exists",
        message = "CA certificate file does not exist"
    ))]
    pub ca_cert_path: Option<String>,

    /// Client certificate (PEM) for mutual TLS. Requires `client_key_path`.
    #[serde(default)]
    #[validate(custom(
        function = "validate_optional_file_exists",
        message = "Client certificate file does not exist"
    ))]
    pub client_cert_path: Option<String>,

    /// Unencrypted client private key (PEM). Requires `client_cert_path`.
    #[serde(default)]
    #[validate(custom(
        function = "validate_optional_file_exists",
        message = "Client key file does not exist"
    ))]
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    pub fn new(
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: Some(client_cert_path.into()),
            client_key_path: Some(client_key_path.into()),
        }
    }

    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: None,
            client_key_path: None,
        }
    }

    /// Both halves of the client identity are present.
    pub fn has_client_auth(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }

    /// A CA certificate is configured, so TLS is in use.
    pub fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
    }

    /// Checks the file layout: a readable CA, and either both client files or neither.
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let Some(ca) = self.ca_cert_path.as_deref() else {
            return Err(ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into()));
        };
        validate_file_path(ca)?;

        match (
            self.client_cert_path.as_deref(),
            self.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)?;
            }
            (None, None) => {}
            _ => {
                return Err(ValidationError::new("incomplete_client_auth").with_message(
                    "Both client certificate and key must be provided or neither".into(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.contains(['+', '#']) {
        return Err(ValidationError::new("topic_wildcard"));
    }
    Ok(())
}

fn validate_optional_file_exists(path: &str) -> Result<(), ValidationError> {
    validate_file_path(path)
}

/// Path is non-empty, exists, and is a regular file.
fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }

    if !path_obj.is_file() {
        return Err(ValidationError::new("not_a_file")
            .with_message(format!("Path is not a file: {path}").into()));
    }

    Ok(())
}
