//! Application configuration loading and validation.
//!
//! The top-level `Config` aggregates the logger, broker transport and sensor
//! sections. It is loaded once at startup, completed with hostname-derived
//! defaults and never modified afterwards.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{homeassistant::HomeAssistantConfig, logger::LoggerConfig, sensors::SensorsConfig};

pub mod homeassistant;
pub mod logger;
pub mod sensors;

/// Environment variable that points at the configuration file.
pub const CONFIG_ENV: &str = "SENSOR_MQTT_CONFIG";

/// Locations probed when neither `--config` nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] =
    ["/etc/sensor_mqtt/sensor_mqtt.toml", "./sensor_mqtt.toml"];

/// Broker section, owned by the broker crate.
pub type TransportConfig = sensor_mqtt_broker::Config;

#[doc(hidden)]
pub fn early_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Timestamped console lines for use before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[derive(Serialize, Deserialize, Debug, Validate, Clone)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[validate(nested)]
    pub transport: TransportConfig,

    #[validate(nested)]
    pub sensors: SensorsConfig,

    #[validate(nested)]
    pub homeassistant: HomeAssistantConfig,

    /// Seconds to wait for collector and publisher tasks after cancellation.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Shutdown grace must be between 1 and 300 seconds"
    ))]
    pub shutdown_grace: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logger: LoggerConfig::default(),
            transport: TransportConfig::default(),
            sensors: SensorsConfig::default(),
            homeassistant: HomeAssistantConfig::default(),
            shutdown_grace: 5,
        }
    }
}

impl Config {
    /// Locates and loads the configuration file.
    ///
    /// `cli_path` is the value of `--config`, if any.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no file is found, or it cannot be read,
    /// parsed or validated.
    pub fn new(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidates: Vec<&Path> = DEFAULT_CONFIG_PATHS.iter().map(Path::new).collect();
        let path = resolve_config_path(cli_path, std::env::var_os(CONFIG_ENV), &candidates)?;
        Self::load(&path)
    }

    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }

    /// Fills in every hostname-derived value the file leaves empty.
    ///
    /// `base_topic` becomes `sensors/<hostname>`, `client_id`
    /// `<hostname>_sensor_mqtt`, and the Home Assistant device name and node id
    /// the hostname itself.
    pub fn apply_host_defaults(&mut self, hostname: &str) -> Result<(), ConfigError> {
        if self.transport.base_topic.trim().is_empty() {
            self.transport.base_topic = format!("sensors/{hostname}");
        }
        if self.transport.client_id.trim().is_empty() {
            self.transport.client_id = format!("{hostname}_sensor_mqtt");
        }
        if self.homeassistant.device_name.trim().is_empty() {
            self.homeassistant.device_name = hostname.to_string();
        }
        if self.homeassistant.node_id.trim().is_empty() {
            self.homeassistant.node_id = hostname.to_string();
        }

        self.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

/// Picks the configuration file.
///
/// Order: the `--config` flag, the environment variable, then the first
/// existing entry of `candidates`. Explicit paths are returned even if they
/// do not exist so that the load reports them.
pub fn resolve_config_path(
    cli_path: Option<&Path>,
    env_path: Option<OsString>,
    candidates: &[&Path],
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = cli_path {
        print_info!("Using config from --config: {}", path.display());
        return Ok(path.to_path_buf());
    }

    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
        return Ok(path);
    }

    for candidate in candidates {
        if candidate.exists() {
            print_info!("Using default config path: {}", candidate.display());
            return Ok(candidate.to_path_buf());
        }
    }

    Err(ConfigError::Config(format!(
        "No configuration file found. Pass --config, set {} or create one of: {}",
        CONFIG_ENV,
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}
