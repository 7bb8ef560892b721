//! Home Assistant MQTT discovery records for the metrics this node publishes.
//!
//! One retained config per metric at
//! `<prefix>/sensor/<node_id>_<metric>/config`. The state topic is the plain
//! per-metric topic, so Home Assistant reads the two-decimal payload as is.

use sensor_mqtt_broker::{Announcement, STATUS_OFFLINE, STATUS_ONLINE};
use serde::Serialize;

use crate::config::{homeassistant::HomeAssistantConfig, sensors::SensorsConfig};

struct MetricInfo {
    name: &'static str,
    label: &'static str,
    unit: &'static str,
    device_class: Option<&'static str>,
}

static ENVIRONMENT_METRICS: [MetricInfo; 3] = [
    MetricInfo {
        name: "temperature",
        label: "Temperature",
        unit: "°C",
        device_class: Some("temperature"),
    },
    MetricInfo {
        name: "pressure",
        label: "Pressure",
        unit: "hPa",
        device_class: Some("pressure"),
    },
    MetricInfo {
        name: "humidity",
        label: "Humidity",
        unit: "%",
        device_class: Some("humidity"),
    },
];

// Home Assistant has no radon device class.
static AIR_QUALITY_METRICS: [MetricInfo; 2] = [
    MetricInfo {
        name: "radon_short",
        label: "Radon Short Term",
        unit: "Bq/m³",
        device_class: None,
    },
    MetricInfo {
        name: "radon_long",
        label: "Radon Long Term",
        unit: "Bq/m³",
        device_class: None,
    },
];

#[derive(Debug, Serialize)]
struct DiscoveryPayload<'a> {
    name: String,
    unique_id: String,
    state_topic: String,
    unit_of_measurement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    availability_topic: String,
    payload_available: &'a str,
    payload_not_available: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_after: Option<u64>,
}

/// Builds the discovery announcements, empty when discovery is disabled.
///
/// Only metrics of enabled pipelines are announced.
pub fn announcements(
    config: &HomeAssistantConfig,
    sensors: &SensorsConfig,
    base_topic: &str,
) -> Result<Vec<Announcement>, serde_json::Error> {
    if !config.enabled {
        return Ok(Vec::new());
    }

    let base_topic = base_topic.trim_end_matches('/');
    let environment = sensors
        .environment
        .enabled
        .then_some(ENVIRONMENT_METRICS.iter())
        .into_iter()
        .flatten();
    let air_quality = sensors
        .ble
        .is_enabled()
        .then_some(AIR_QUALITY_METRICS.iter())
        .into_iter()
        .flatten();

    environment
        .chain(air_quality)
        .map(|metric| {
            let unique_id = format!("{}_{}", config.node_id, metric.name);
            let payload = DiscoveryPayload {
                name: format!("{} {}", config.device_name, metric.label),
                state_topic: format!("{}/{}", base_topic, metric.name),
                unit_of_measurement: metric.unit,
                device_class: metric.device_class,
                availability_topic: format!("{}/status", base_topic),
                payload_available: STATUS_ONLINE,
                payload_not_available: STATUS_OFFLINE,
                expire_after: (config.expire_after > 0).then_some(config.expire_after),
                unique_id: unique_id.clone(),
            };
            Ok(Announcement {
                topic: format!(
                    "{}/sensor/{}/config",
                    config.discovery_prefix.trim_end_matches('/'),
                    unique_id
                ),
                payload: serde_json::to_string(&payload)?,
            })
        })
        .collect()
}
