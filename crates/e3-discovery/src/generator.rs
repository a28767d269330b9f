//! Discovery generator
//!
//! Turns one `(topic, value)` telemetry message into zero or more discovery
//! messages. Generation never fails: anything that cannot be mapped to a
//! configured entity yields an empty list.

use std::sync::Arc;

use e3_config::merge::{entity_keys, merge_into, merge_layers};
use e3_config::{Configuration, Datapoint, Mapping, SubItem};
use e3_core::{
    object_id, parse_topic, EntityKind, ParsedTopic, COMMAND_TOPIC, DEFAULT_DISCOVERY_PREFIX,
    PAYLOAD_PRESS, TEST_PREFIX,
};
use serde_json::Value as JsonValue;
use serde_yaml::Value;
use tracing::{debug, trace, warn};

use crate::climate;
use crate::descriptor::{DiscoveryMessage, EntityConfig};
use crate::device_registry::DeviceRegistry;
use crate::names::NameResolver;

/// Payloads used by binary sensors whose template names none
const DEFAULT_PAYLOAD_ON: &str = "1.0";
const DEFAULT_PAYLOAD_OFF: &str = "0.0";

/// Values a switch writes when its template names none
const DEFAULT_COMMAND_ON: &str = "1";
const DEFAULT_COMMAND_OFF: &str = "0";

/// Outcome of the primary entity path for one datapoint
enum Primary {
    /// Type or sub-item gates stopped generation for the whole message
    Gated,
    /// Gates passed; the entity itself may still be withheld
    Passed(Option<DiscoveryMessage>),
}

/// Attributes each entity kind takes from its merged template
fn accepted_keys(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Sensor => &[
            "device_class",
            "unit_of_measurement",
            "icon",
            "state_class",
            "value_template",
        ],
        EntityKind::BinarySensor => &[
            "device_class",
            "icon",
            "value_template",
            "payload_on",
            "payload_off",
        ],
        EntityKind::Switch => &[
            "device_class",
            "icon",
            "value_template",
            "payload_on",
            "payload_off",
            "state_on",
            "state_off",
            "command_template",
        ],
        EntityKind::Number => &[
            "device_class",
            "unit_of_measurement",
            "icon",
            "mode",
            "value_template",
            "command_template",
        ],
        EntityKind::Select => &["icon", "options", "value_template", "command_template"],
        EntityKind::Button => &["device_class", "icon", "command_template"],
        EntityKind::Climate => &[],
    }
}

/// Generator settings
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Discovery root, `homeassistant` when empty
    pub discovery_prefix: String,
    /// Prepend `test/` to the root for test-mode messages
    pub add_test_prefix: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
            add_test_prefix: true,
        }
    }
}

/// Maps Open3E telemetry onto discovery messages
pub struct DiscoveryGenerator {
    config: Arc<Configuration>,
    options: GeneratorOptions,
    devices: DeviceRegistry,
    names: NameResolver,
}

impl DiscoveryGenerator {
    pub fn new(config: Arc<Configuration>, options: GeneratorOptions) -> Self {
        Self {
            devices: DeviceRegistry::new(config.clone()),
            names: NameResolver::new(config.clone()),
            config,
            options,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// `(discovery topic, JSON payload)` pairs for one telemetry message
    pub fn generate(&self, topic: &str, value: &str, test_mode: bool) -> Vec<(String, String)> {
        self.generate_messages(topic, value, test_mode)
            .into_iter()
            .filter_map(|message| match message.payload() {
                Ok(payload) => Some((message.topic, payload)),
                Err(e) => {
                    warn!("Failed to serialize discovery for {}: {}", message.object_id, e);
                    None
                }
            })
            .collect()
    }

    /// Typed discovery messages for one telemetry message
    pub fn generate_messages(
        &self,
        topic: &str,
        value: &str,
        test_mode: bool,
    ) -> Vec<DiscoveryMessage> {
        let Some(parsed) = parse_topic(topic) else {
            trace!("Not an Open3E datapoint topic: {}", topic);
            return Vec::new();
        };

        if self.config.is_ignored(parsed.identifier) {
            trace!("Ignoring DID {}", parsed.identifier);
            return Vec::new();
        }

        self.devices
            .observe(&parsed.device_addr, parsed.identifier, value);

        let Some(datapoint) = self.config.datapoint(parsed.identifier) else {
            debug!("Skipping unknown DID {} (not configured)", parsed.identifier);
            return Vec::new();
        };

        let Primary::Passed(entity) = self.entity_message(&parsed, &datapoint, test_mode) else {
            return Vec::new();
        };

        let mut messages = Vec::with_capacity(2);
        messages.extend(entity);

        if let Some(block) = datapoint.climate() {
            if block.is_triggered_by(parsed.sub_path.as_deref()) {
                messages.push(climate::climate_message(self, &parsed, &block, test_mode));
            }
        }

        messages
    }

    /// `<prefix>/<kind>/<object_id>/config`
    pub fn discovery_topic(&self, kind: EntityKind, object_id: &str, test_mode: bool) -> String {
        let prefix = if self.options.discovery_prefix.is_empty() {
            DEFAULT_DISCOVERY_PREFIX
        } else {
            self.options.discovery_prefix.as_str()
        };

        if self.options.add_test_prefix && test_mode && !prefix.starts_with(TEST_PREFIX) {
            format!("{}{}/{}/{}/config", TEST_PREFIX, prefix, kind, object_id)
        } else {
            format!("{}/{}/{}/config", prefix, kind, object_id)
        }
    }

    pub(crate) fn names(&self) -> &NameResolver {
        &self.names
    }

    fn entity_message(
        &self,
        parsed: &ParsedTopic,
        datapoint: &Datapoint<'_>,
        test_mode: bool,
    ) -> Primary {
        let id = parsed.identifier;
        if datapoint.is_device_info() {
            trace!("DID {}: identification only", id);
            return Primary::Gated;
        }
        let Some(type_name) = datapoint.type_name() else {
            debug!("DID {}: no type", id);
            return Primary::Gated;
        };
        let Some(template) = self.config.type_template(type_name) else {
            debug!("DID {}: no type template '{}'", id, type_name);
            return Primary::Gated;
        };

        let sub = match (parsed.sub_path.as_deref(), datapoint.has_subs()) {
            (Some(sub_path), true) => {
                let sub = datapoint.sub(sub_path);
                if !sub.is_enabled() {
                    debug!("DID {}: sub '{}' disabled", id, sub_path);
                    return Primary::Gated;
                }
                Some(sub)
            }
            _ => None,
        };

        let kind_name = sub
            .and_then(|s| s.entity_type())
            .or_else(|| template.get("entity_type").and_then(Value::as_str))
            .unwrap_or("sensor");
        let kind = match kind_name.parse::<EntityKind>() {
            Ok(EntityKind::Climate) | Err(_) => {
                warn!("DID {}: unsupported entity_type '{}'", id, kind_name);
                return Primary::Passed(None);
            }
            Ok(kind) => kind,
        };

        let mut merged = merge_layers(std::iter::once(template).chain(sub.and_then(|s| s.raw())));
        merge_into(&mut merged, &entity_keys(datapoint.raw()));
        if let Some(overlay) = self.config.translations().value_template(id) {
            merged.insert(
                Value::String("value_template".to_string()),
                Value::String(overlay.to_string()),
            );
        }

        let requested = kind;
        let permitted =
            !kind.is_writable() || self.write_permitted(datapoint, sub.as_ref(), template);
        let kind = if !permitted {
            match kind.read_only() {
                Some(read_only) => {
                    debug!("DID {}: write not permitted, publishing as {}", id, read_only);
                    read_only
                }
                None => {
                    debug!("DID {}: write not permitted, skipping {}", id, kind);
                    return Primary::Passed(None);
                }
            }
        } else {
            kind
        };

        let object_id = object_id(&parsed.device_addr, id, sub.map(|s| s.name()));
        let name = self.names.resolve(datapoint, sub.as_ref());
        let device = self.devices.device_info(&parsed.device_addr, None);

        let mut config = EntityConfig::new(name, &object_id, device);
        if kind.has_state() {
            config = config.with_state_topic(&parsed.original_topic);
        }

        for key in accepted_keys(kind) {
            if let Some(value) = merged.get(*key) {
                set_yaml(&mut config, key, value);
            }
        }

        match kind {
            EntityKind::BinarySensor => {
                if requested == EntityKind::Switch {
                    // Read-only view of a switch reports its state strings
                    for (state_key, payload_key) in
                        [("state_on", "payload_on"), ("state_off", "payload_off")]
                    {
                        if let Some(value) = merged.get(state_key) {
                            set_yaml(&mut config, payload_key, value);
                        }
                    }
                }
                if !config.contains("payload_on") {
                    config.set("payload_on", DEFAULT_PAYLOAD_ON);
                }
                if !config.contains("payload_off") {
                    config.set("payload_off", DEFAULT_PAYLOAD_OFF);
                }
            }
            EntityKind::Number => {
                self.add_command_side(&mut config, datapoint);
                for key in ["min", "max", "step"] {
                    if let Some(value) = datapoint.get(key).or_else(|| merged.get(key)) {
                        set_yaml(&mut config, key, value);
                    }
                }
            }
            EntityKind::Switch => {
                self.add_command_side(&mut config, datapoint);
                for (key, default) in [
                    ("payload_on", DEFAULT_COMMAND_ON),
                    ("payload_off", DEFAULT_COMMAND_OFF),
                    ("state_on", DEFAULT_PAYLOAD_ON),
                    ("state_off", DEFAULT_PAYLOAD_OFF),
                ] {
                    if !config.contains(key) {
                        config.set(key, default);
                    }
                }
            }
            EntityKind::Select => config.set("command_topic", COMMAND_TOPIC),
            EntityKind::Button => {
                self.add_command_side(&mut config, datapoint);
                config.set("payload_press", PAYLOAD_PRESS);
            }
            EntityKind::Sensor | EntityKind::Climate => {}
        }

        Primary::Passed(Some(DiscoveryMessage {
            topic: self.discovery_topic(kind, &object_id, test_mode),
            kind,
            object_id,
            config,
        }))
    }

    /// Whether the entity may expose command topics.
    ///
    /// Writing is opt-in: the sub-item, the datapoint or the type template
    /// must say `writable: true`. An explicit `writable: false` at any of
    /// those levels and the write blacklist both forbid it.
    fn write_permitted(
        &self,
        datapoint: &Datapoint<'_>,
        sub: Option<&SubItem<'_>>,
        template: &Mapping,
    ) -> bool {
        if self.config.is_write_blacklisted(datapoint.id()) {
            return false;
        }
        let flags = [
            sub.and_then(SubItem::writable),
            datapoint.writable(),
            template.get("writable").and_then(Value::as_bool),
        ];
        flags.contains(&Some(true)) && !flags.contains(&Some(false))
    }

    fn add_command_side(&self, config: &mut EntityConfig, datapoint: &Datapoint<'_>) {
        config.set("command_topic", COMMAND_TOPIC);
        if !config.contains("command_template") {
            config.set(
                "command_template",
                default_command_template(datapoint.write_mode(), datapoint.id()),
            );
        }
    }
}

/// `{"mode": "<write_mode>", "data": [[<id>, "{{ value }}"]]}`
pub fn default_command_template(write_mode: &str, identifier: u32) -> String {
    format!(
        r#"{{"mode": "{}", "data": [[{}, "{{{{ value }}}}"]]}}"#,
        write_mode, identifier
    )
}

fn set_yaml(config: &mut EntityConfig, key: &str, value: &Value) {
    match serde_json::to_value(value) {
        Ok(JsonValue::Null) => {}
        Ok(json) => config.set(key, json),
        Err(e) => debug!("Skipping attribute '{}': {}", key, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e3_config::ConfigSources;

    fn generator(datapoints: &str) -> DiscoveryGenerator {
        let sources = ConfigSources::new("en")
            .with_datapoints(serde_yaml::from_str(datapoints).unwrap())
            .with_types(serde_yaml::from_str("status: {entity_type: sensor}").unwrap());
        DiscoveryGenerator::new(Arc::new(Configuration::new(sources)), GeneratorOptions::default())
    }

    #[test]
    fn test_disabled_trigger_sub_has_no_climate() {
        let generator = generator(
            r#"
datapoints:
  1415:
    name: Circuit 1 Operation Mode
    type: status
    subs:
      Mode/ID: {enabled: false}
    climate: {}
"#,
        );
        let topic = "open3e/680_1415_MixerOneCircuitOperationState/Mode/ID";
        assert!(generator.generate(topic, "1", false).is_empty());
    }

    #[test]
    fn test_unresolved_type_has_no_climate() {
        let generator = generator(
            r#"
datapoints:
  1416: {name: Circuit 2 Operation Mode, type: nosuchtype, climate: {}}
  1417: {name: Circuit 3 Operation Mode, climate: {}}
"#,
        );
        for topic in [
            "open3e/680_1416_MixerTwoCircuitOperationState/Mode/ID",
            "open3e/680_1417_MixerThreeCircuitOperationState/Mode/ID",
        ] {
            assert!(generator.generate(topic, "1", false).is_empty(), "{}", topic);
        }
    }

    #[test]
    fn test_enabled_trigger_sub_keeps_climate() {
        let generator = generator(
            r#"
datapoints:
  1415:
    name: Circuit 1 Operation Mode
    type: status
    subs:
      Mode/ID: {}
    climate: {}
"#,
        );
        let out = generator.generate_messages(
            "open3e/680_1415_MixerOneCircuitOperationState/Mode/ID",
            "1",
            false,
        );
        let kinds: Vec<_> = out.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Sensor, EntityKind::Climate]);
    }

    #[test]
    fn test_default_command_template() {
        assert_eq!(
            default_command_template("write", 396),
            r#"{"mode": "write", "data": [[396, "{{ value }}"]]}"#
        );
    }

    #[test]
    fn test_accepted_keys() {
        assert!(accepted_keys(EntityKind::Sensor).contains(&"state_class"));
        assert!(!accepted_keys(EntityKind::Sensor).contains(&"command_template"));
        assert!(accepted_keys(EntityKind::Select).contains(&"options"));
        assert!(accepted_keys(EntityKind::Climate).is_empty());
    }
}
