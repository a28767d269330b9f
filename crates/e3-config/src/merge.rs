//! Layered attribute merging
//!
//! Entity attributes are assembled from up to three layers: the type
//! template, the sub-item settings and the datapoint's own keys. Later
//! layers win; nested mappings are merged key by key.

use serde_yaml::{Mapping, Value};

/// Datapoint-level keys that override the merged template
pub const ENTITY_KEYS: &[&str] = &[
    "device_class",
    "unit_of_measurement",
    "icon",
    "state_class",
    "mode",
    "payload_on",
    "payload_off",
    "state_on",
    "state_off",
    "value_template",
    "command_template",
    "options",
];

/// Recursively merge `overlay` into `base`
pub fn merge_into(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge layers in order, last writer wins
pub fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a Mapping>) -> Mapping {
    let mut merged = Mapping::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Copy only the [`ENTITY_KEYS`] present in `source`
pub fn entity_keys(source: &Mapping) -> Mapping {
    ENTITY_KEYS
        .iter()
        .filter_map(|key| {
            source
                .get(*key)
                .map(|value| (Value::String(key.to_string()), value.clone()))
        })
        .collect()
}
