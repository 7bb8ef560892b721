use std::{process, sync::Arc, sync::OnceLock, time::Duration};

use clap::Parser;
use sensor_mqtt::{
    cli::Cli,
    config::{Config, TransportConfig},
    core::{
        discovery,
        drivers::HardwareSensors,
        pipeline::Pipeline,
        publisher::Publisher,
        shutdown::Shutdown,
    },
    logger::LoggerManager,
    print_error,
};
use sensor_mqtt_broker::MqttManager;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

fn config(cli: &Cli) -> &'static Config {
    CONFIG.get_or_init(|| {
        load_config(cli).unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut cfg = Config::new(cli.config.as_deref())?;
    cli.apply_overrides(&mut cfg);

    let hostname = hostname::get()?.to_string_lossy().into_owned();
    cfg.apply_host_defaults(&hostname)?;
    Ok(cfg)
}

/// Long enough for rumqttc's own connect timeout to fire first.
fn startup_connect_timeout(transport: &TransportConfig) -> Duration {
    Duration::from_secs(transport.connection_timeout + 5)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = config(&cli);

    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting sensor-mqtt version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.transport);

    let shutdown = Shutdown::listen().unwrap_or_else(|e| {
        error!("Failed to install signal handlers: {}", e);
        process::exit(1);
    });

    let announcements =
        discovery::announcements(&cfg.homeassistant, &cfg.sensors, &cfg.transport.base_topic)
            .unwrap_or_else(|e| {
                error!("Failed to build Home Assistant discovery records: {}", e);
                process::exit(1);
            });
    if !announcements.is_empty() {
        info!(
            "Home Assistant discovery enabled for {} metrics",
            announcements.len()
        );
    }

    let manager = MqttManager::from_config(cfg.transport.clone())
        .map(|manager| manager.with_announcements(announcements))
        .unwrap_or_else(|e| {
            error!("Invalid MQTT configuration: {}", e);
            process::exit(1);
        });
    let instance = manager.build_and_start().await.unwrap_or_else(|e| {
        error!("Failed to start MQTT connection: {}", e);
        process::exit(1);
    });
    if let Err(e) = instance
        .wait_connected(startup_connect_timeout(&cfg.transport))
        .await
    {
        error!(
            "Unable to connect to {}:{}: {}",
            cfg.transport.host, cfg.transport.port, e
        );
        process::exit(1);
    }
    info!("Connected, status on {}", instance.status_topic());

    let cancel = CancellationToken::new();
    let mut pipeline = Pipeline::new(cancel.clone());
    let publisher: Arc<dyn Publisher> = Arc::new(instance.clone());
    if let Err(e) = pipeline.spawn_sensors(
        &cfg.sensors,
        &HardwareSensors,
        publisher,
        instance.base_topic(),
    ) {
        error!("Failed to open sensor: {}", e);
        process::exit(1);
    }
    if pipeline.is_empty() {
        warn!("No sensors enabled, only the status topic will be maintained");
    }

    tokio::select! {
        reason = shutdown.wait() => {
            match reason {
                Ok(reason) => info!("Received {}, initiating graceful shutdown...", reason),
                Err(e) => warn!("Signal listener failed ({}), shutting down", e),
            }
        }
        fatal = pipeline.wait_fatal() => {
            // no clean disconnect: the broker publishes the offline last-will
            error!("Fatal sensor error: {}", fatal);
            cancel.cancel();
            process::exit(1);
        }
        reason = instance.wait_stopped() => {
            error!("MQTT connection gave up: {}", reason);
            cancel.cancel();
            process::exit(1);
        }
    }

    if !pipeline.shutdown(cfg.shutdown_grace()).await {
        warn!("Some tasks had to be aborted");
    }

    if let Err(e) = instance.disconnect().await {
        warn!("MQTT disconnect reported: {}", e);
    }
    info!("Shutdown complete");
}
