//! Home Assistant MQTT discovery settings.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HomeAssistantConfig {
    pub enabled: bool,

    /// Prefix shown in entity names. Empty means the hostname.
    pub device_name: String,

    /// Used in discovery topics and unique ids. Empty means the hostname.
    #[validate(custom(
        function = "validate_topic_segment",
        message = "node_id must not contain '/', '+', '#' or whitespace"
    ))]
    pub node_id: String,

    #[validate(length(min = 1, message = "Discovery prefix cannot be empty"))]
    pub discovery_prefix: String,

    /// Seconds without an update before Home Assistant marks a value stale.
    /// 0 leaves it out of the discovery record.
    #[validate(range(max = 86400, message = "expire_after must be at most one day"))]
    pub expire_after: u64,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        HomeAssistantConfig {
            enabled: false,
            device_name: String::new(),
            node_id: String::new(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            expire_after: 300,
        }
    }
}

fn validate_topic_segment(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| matches!(c, '/' | '+' | '#') || c.is_whitespace())
    {
        return Err(ValidationError::new("invalid_topic_segment"));
    }
    Ok(())
}
