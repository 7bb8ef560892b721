//! MQTT client builder with last-will and TLS support.
//!
//! `ClientBuilder` turns a validated [`Config`] into rumqttc's `AsyncClient`
//! and `EventLoop`. Every client it builds registers the retained `offline`
//! last-will on the status topic, so the broker announces the device offline
//! whenever the connection ends without a DISCONNECT packet.
//!
//! ```ignore
//! use sensor_mqtt_broker::{ClientBuilder, Config};
//!
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build()?;
//! ```

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS, TlsConfiguration, Transport};
use validator::Validate;

use super::{
    config::{Config, TlsConfig},
    error::TransferError,
};

/// Payload the broker publishes on our behalf after an unclean disconnect.
pub const STATUS_OFFLINE: &str = "offline";

/// Payload published on every successful (re)connect.
pub const STATUS_ONLINE: &str = "online";

/// Builder for constructing MQTT clients with fluent API.
///
/// Consumed by `build()`, which returns the client and its event loop. The
/// client is cloneable and thread-safe; the event loop must be polled by
/// exactly one task (see `ConnectionKernel`).
pub struct ClientBuilder {
    /// MQTT protocol options (host, port, keep-alive, credentials, etc.)
    opts: MqttOptions,

    /// Capacity of the request queue between client handles and the event loop.
    cap: usize,

    /// Seconds for TCP connect + TLS handshake. Applied to the event loop.
    connection_timeout: u64,

    tls_config: Option<TlsConfig>,
}

impl ClientBuilder {
    /// Creates a builder with plain TCP and rumqttc defaults.
    pub fn new(
        client_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        cap: usize,
    ) -> Result<Self, TransferError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(TransferError::ClientSetup("client id must not be empty".into()));
        }

        Ok(Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
            connection_timeout: 5,
            tls_config: None,
        })
    }

    /// Creates a builder from a validated configuration section.
    ///
    /// Sets credentials, keep-alive, session, inflight and packet limits, TLS,
    /// the connect timeout and the status last-will.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let client_id = if config.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.client_id.clone()
        };

        let mut builder = Self::new(
            client_id,
            config.host.clone(),
            config.port,
            config.request_channel_capacity.unwrap_or(10) as usize,
        )?
        .keep_alive(config.keep_alive)
        .clean_session(config.clean_session)
        .max_inflight(config.max_inflight)
        .connection_timeout(config.connection_timeout)
        .set_last_will(&config.status_topic());

        if let Some(max_packet_size) = config.max_packet_size {
            builder = builder.max_packet_size(max_packet_size as usize, max_packet_size as usize);
        }

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(username, config.password.clone().unwrap_or_default());
        }

        if let Some(tls) = config.tls.as_ref().filter(|tls| tls.is_enabled()) {
            builder.tls_config = Some(tls.clone());
        }

        Ok(builder)
    }

    /// Configures TLS with both CA and client certificates.
    pub fn with_tls(
        mut self,
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        self.tls_config = Some(TlsConfig::new(
            ca_cert_path,
            client_cert_path,
            client_key_path,
        ));
        self
    }

    /// Configures TLS with only a CA certificate (no client auth).
    pub fn with_tls_ca_only(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.tls_config = Some(TlsConfig::with_ca_only(ca_cert_path));
        self
    }

    /// Sets the keep-alive interval (in seconds).
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    /// Bounds TCP connect and TLS handshake (in seconds).
    pub fn connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout = secs;
        self
    }

    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    /// Sets MQTT authentication credentials.
    ///
    /// Sent in clear text unless TLS is configured.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    pub fn max_inflight(mut self, max: u16) -> Self {
        self.opts.set_inflight(max);
        self
    }

    /// Registers the retained `offline` last-will on `status_topic`.
    ///
    /// QoS 1, retained, so a subscriber that connects later still sees the
    /// last known status.
    pub fn set_last_will(mut self, status_topic: &str) -> Self {
        let last_will = LastWill::new(
            status_topic,
            STATUS_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        );
        self.opts.set_last_will(last_will);
        self
    }

    /// The last-will that will be sent in CONNECT, if any.
    pub fn last_will(&self) -> Option<LastWill> {
        self.opts.last_will()
    }

    fn load_file(path: &str) -> Result<Vec<u8>, TransferError> {
        Ok(fs::read(path)?)
    }

    /// Reads certificate files and builds the TLS transport.
    fn build_tls_transport(tls_config: &TlsConfig) -> Result<Transport, TransferError> {
        tls_config
            .validate_config()
            .map_err(|e| TransferError::ClientSetup(format!("Invalid TLS configuration: {e}")))?;

        let ca_path = tls_config
            .ca_cert_path
            .as_deref()
            .ok_or_else(|| TransferError::ClientSetup("TLS configuration is not set".into()))?;
        let ca = Self::load_file(ca_path)?;

        let client_auth = match (
            tls_config.client_cert_path.as_deref(),
            tls_config.client_key_path.as_deref(),
        ) {
            (Some(cert), Some(key)) => Some((Self::load_file(cert)?, Self::load_file(key)?)),
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            client_auth,
            alpn: None,
        }))
    }

    /// Constructs the MQTT client and event loop.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let mut opts = self.opts;

        if let Some(tls_config) = self.tls_config.as_ref() {
            opts.set_transport(Self::build_tls_transport(tls_config)?);
        }

        let (client, mut event_loop) = AsyncClient::new(opts, self.cap);

        let mut network = event_loop.network_options();
        network.set_connection_timeout(self.connection_timeout);
        event_loop.set_network_options(network);

        Ok((client, event_loop))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;

    /// Temporary certificate files, removed on drop.
    struct TestFiles {
        _temp_dir: TempDir,
        ca_cert: String,
        client_cert: String,
        client_key: String,
    }

    impl TestFiles {
        fn new() -> std::io::Result<Self> {
            let temp_dir = TempDir::new()?;

            let ca_cert = temp_dir.path().join("ca.crt");
            let client_cert = temp_dir.path().join("client.crt");
            let client_key = temp_dir.path().join("client.key");

            File::create(&ca_cert)?.write_all(b"ca certificate content")?;
            File::create(&client_cert)?.write_all(b"client certificate content")?;
            File::create(&client_key)?.write_all(b"client key content")?;

            Ok(TestFiles {
                _temp_dir: temp_dir,
                ca_cert: ca_cert.to_string_lossy().into_owned(),
                client_cert: client_cert.to_string_lossy().into_owned(),
                client_key: client_key.to_string_lossy().into_owned(),
            })
        }
    }

    fn node_config() -> Config {
        Config {
            base_topic: "sensors/node-1".into(),
            client_id: "node-1_sensor_mqtt".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_rejects_empty_client_id() {
        assert!(ClientBuilder::new("  ", "localhost", 1883, 10).is_err());
    }

    #[test]
    fn test_from_config_registers_offline_last_will() {
        let builder = ClientBuilder::from_config(&node_config()).unwrap();
        let will = builder.last_will().expect("last will must be set");

        assert_eq!(will.topic, "sensors/node-1/status");
        assert_eq!(&will.message[..], STATUS_OFFLINE.as_bytes());
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn test_from_config_generates_client_id_when_empty() {
        let config = Config {
            client_id: String::new(),
            ..node_config()
        };
        assert!(ClientBuilder::from_config(&config).is_ok());
    }

    #[test]
    fn test_from_config_invalid() {
        let config = Config {
            host: String::new(),
            ..node_config()
        };
        assert!(matches!(
            ClientBuilder::from_config(&config),
            Err(TransferError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_build_tcp_client() {
        let result = ClientBuilder::from_config(&node_config()).unwrap().build();
        assert!(result.is_ok());

        let (_, event_loop) = result.unwrap();
        assert_eq!(event_loop.network_options().connection_timeout(), 1);
    }

    #[tokio::test]
    async fn test_build_tls_client_with_client_auth() {
        let test_files = TestFiles::new().expect("Failed to create test files");

        let result = ClientBuilder::new("test_client", "localhost", 8883, 10)
            .unwrap()
            .with_tls(
                &test_files.ca_cert,
                &test_files.client_cert,
                &test_files.client_key,
            )
            .build();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_tls_client_without_client_auth() {
        let test_files = TestFiles::new().expect("Failed to create test files");

        let result = ClientBuilder::new("test_client", "localhost", 8883, 10)
            .unwrap()
            .with_tls_ca_only(&test_files.ca_cert)
            .build();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_tls_missing_ca() {
        let result = ClientBuilder::new("test_client", "localhost", 8883, 10)
            .unwrap()
            .with_tls_ca_only("/nonexistent/ca.crt")
            .build();

        assert!(matches!(result, Err(TransferError::ClientSetup(_))));
    }
}
