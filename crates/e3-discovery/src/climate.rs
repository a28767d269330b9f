//! Climate entity assembly
//!
//! A heating circuit publishes its operation mode and its setpoint under
//! different identifiers. The climate entity stitches both together: it is
//! announced when the mode sub-path is seen and points at the setpoint
//! topic configured in the datapoint's `climate` block.

use e3_config::ClimateBlock;
use e3_core::{object_id, EntityKind, ParsedTopic, COMMAND_TOPIC, MODE_STATE_SUB_PATH, ROOT_TOPIC};
use serde_json::Value as JsonValue;

use crate::descriptor::{DiscoveryMessage, EntityConfig};
use crate::generator::DiscoveryGenerator;

/// Sub-item marker of climate object ids
pub const CLIMATE_SUB_ITEM: &str = "climate";

/// Keys copied verbatim from the block when present
const PASS_THROUGH_KEYS: &[&str] = &[
    "mode_state_template",
    "mode_command_template",
    "temperature_command_template",
    "min_temp",
    "max_temp",
    "precision",
    "temperature_unit",
];

const DEFAULT_MODES: &[&str] = &["off", "auto"];

pub(crate) fn climate_message(
    generator: &DiscoveryGenerator,
    parsed: &ParsedTopic,
    block: &ClimateBlock<'_>,
    test_mode: bool,
) -> DiscoveryMessage {
    let addr = &parsed.device_addr;
    let object_id = object_id(addr, parsed.identifier, Some(CLIMATE_SUB_ITEM));
    let name = generator.names().climate_name(block);
    let device = generator.devices().device_info(addr, None);

    let mut config = EntityConfig::new(name, &object_id, device);

    let modes = match block.modes().and_then(|m| serde_json::to_value(m).ok()) {
        Some(modes) => modes,
        None => JsonValue::from(DEFAULT_MODES.to_vec()),
    };
    config.set("modes", modes);
    config.set(
        "mode_state_topic",
        format!(
            "{}/{}_{}_{}/{}",
            ROOT_TOPIC, addr, parsed.identifier, parsed.item_name, MODE_STATE_SUB_PATH
        ),
    );
    config.set("mode_command_topic", COMMAND_TOPIC);

    if let (Some(did), Some(item)) = (block.temperature_did(), block.temperature_did_name()) {
        if !item.is_empty() {
            config.set(
                "temperature_state_topic",
                format!("{}/{}_{}_{}", ROOT_TOPIC, addr, did, item),
            );
        }
    }
    config.set("temperature_command_topic", COMMAND_TOPIC);

    for key in PASS_THROUGH_KEYS {
        if let Some(value) = block.get(key).and_then(|v| serde_json::to_value(v).ok()) {
            config.set(key, value);
        }
    }

    DiscoveryMessage {
        topic: generator.discovery_topic(EntityKind::Climate, &object_id, test_mode),
        kind: EntityKind::Climate,
        object_id,
        config,
    }
}
