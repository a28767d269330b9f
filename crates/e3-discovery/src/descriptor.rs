//! Discovery payload types
//!
//! Field order is fixed by the struct definitions and entity attributes are
//! kept in a sorted map, so the same input always serializes to the same
//! bytes.

use e3_core::{origin, EntityKind, LWT_TOPIC, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};
use serde::Serialize;
use serde_json::{Map, Value};

/// Device block shared by all entities of one ECU
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    pub suggested_area: String,
}

/// Names the software that published the entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Origin {
    pub name: String,
    pub sw_version: String,
    pub support_url: String,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            name: origin::NAME.to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            support_url: origin::SUPPORT_URL.to_string(),
        }
    }
}

/// Discovery payload of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityConfig {
    pub name: String,
    pub unique_id: String,
    pub default_entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub device: DeviceInfo,
    pub origin: Origin,
    /// Kind-specific attributes (unit, templates, command topic, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EntityConfig {
    pub fn new(name: String, object_id: &str, device: DeviceInfo) -> Self {
        Self {
            name,
            unique_id: object_id.to_string(),
            default_entity_id: object_id.to_string(),
            state_topic: None,
            availability_topic: LWT_TOPIC.to_string(),
            payload_available: PAYLOAD_AVAILABLE.to_string(),
            payload_not_available: PAYLOAD_NOT_AVAILABLE.to_string(),
            device,
            origin: Origin::default(),
            attributes: Map::new(),
        }
    }

    pub fn with_state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = Some(topic.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
}

/// A discovery configuration ready to publish
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryMessage {
    pub kind: EntityKind,
    pub object_id: String,
    /// `<prefix>/<kind>/<object_id>/config`
    pub topic: String,
    pub config: EntityConfig,
}

impl DiscoveryMessage {
    /// JSON payload, UTF-8 and unescaped
    pub fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo {
            identifiers: vec!["open3e_680".to_string()],
            name: "Vitocal".to_string(),
            manufacturer: "Viessmann".to_string(),
            model: "Vitocal Heat Pump".to_string(),
            sw_version: None,
            suggested_area: "Heizung".to_string(),
        }
    }

    #[test]
    fn test_payload_layout() {
        let mut config = EntityConfig::new("Vorlauftemperatur".to_string(), "open3e_680_268", device())
            .with_state_topic("open3e/680_268_FlowTemperatureSensor");
        config.set("unit_of_measurement", "°C");

        let payload = serde_json::to_string(&config).unwrap();
        assert!(payload.starts_with(r#"{"name":"Vorlauftemperatur","unique_id":"open3e_680_268","default_entity_id":"open3e_680_268","state_topic":"#));
        assert!(payload.contains("°C"));
        assert!(!payload.contains("sw_version\":null"));

        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["availability_topic"], "open3e/LWT");
        assert_eq!(value["origin"]["name"], "Open3E Bridge");
        assert_eq!(value["device"]["suggested_area"], "Heizung");
    }

    #[test]
    fn test_stateless_payload() {
        let config = EntityConfig::new("Charge".to_string(), "open3e_680_1710", device());
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("state_topic").is_none());
    }
}
