//! Command-line arguments.
//!
//! Every value flag overrides the matching entry of the loaded file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "sensor-mqtt", version, about)]
pub struct Cli {
    /// Configuration file, overrides SENSOR_MQTT_CONFIG and the default locations.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level, overrides `logger.level` (RUST_LOG still wins).
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long)]
    pub debug: bool,

    /// Broker host.
    #[arg(long, value_name = "HOST")]
    pub mqtt_host: Option<String>,

    /// Broker port.
    #[arg(long, value_name = "PORT")]
    pub mqtt_port: Option<u16>,

    /// Broker username.
    #[arg(long, value_name = "USER")]
    pub mqtt_user: Option<String>,

    /// Broker password.
    #[arg(long, value_name = "PASSWORD")]
    pub mqtt_password: Option<String>,

    /// Topic prefix for metrics and status, e.g. `sensors/garage`.
    #[arg(long, value_name = "TOPIC")]
    pub mqtt_topic_base: Option<String>,

    /// Device name shown in Home Assistant.
    #[arg(long, value_name = "NAME")]
    pub device_name: Option<String>,

    /// Publish Home Assistant discovery records.
    #[arg(short, long)]
    pub enable_homeassistant_discovery: bool,
}

impl Cli {
    /// Applies the flags on top of a loaded configuration.
    ///
    /// Validation is left to the caller.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logger.level = level.clone();
        } else if self.debug {
            config.logger.level = "debug".to_string();
        }

        let transport = &mut config.transport;
        if let Some(host) = &self.mqtt_host {
            transport.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            transport.port = port;
        }
        if let Some(user) = &self.mqtt_user {
            transport.username = Some(user.clone());
        }
        if let Some(password) = &self.mqtt_password {
            transport.password = Some(password.clone());
        }
        if let Some(base) = &self.mqtt_topic_base {
            transport.base_topic = base.clone();
        }

        if let Some(name) = &self.device_name {
            config.homeassistant.device_name = name.clone();
        }
        if self.enable_homeassistant_discovery {
            config.homeassistant.enabled = true;
        }
    }
}
