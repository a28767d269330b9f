//! Core types for the Open3E discovery bridge
//!
//! This crate provides the fundamental types shared by the configuration,
//! discovery and bridge crates: the inbound topic parser, entity kinds,
//! object-id sanitising and the fixed topic/device constants of the
//! Open3E bus.

mod entity_kind;
mod topic;

pub use entity_kind::{object_id, EntityKind, EntityKindError};
pub use topic::{parse_topic, ParsedTopic};

/// First segment of every inbound telemetry topic
pub const ROOT_TOPIC: &str = "open3e";

/// Well-known topic accepting `{mode, data: [[id, value]]}` write envelopes
pub const COMMAND_TOPIC: &str = "open3e/cmnd";

/// Last-will topic of the Open3E daemon, used as availability topic
pub const LWT_TOPIC: &str = "open3e/LWT";

/// Availability payloads published on [`LWT_TOPIC`]
pub const PAYLOAD_AVAILABLE: &str = "online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";

/// Default discovery root of the home-automation hub
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Namespace segment prepended to the discovery root in test mode
pub const TEST_PREFIX: &str = "test/";

/// Manufacturer reported in every device block
pub const MANUFACTURER: &str = "Viessmann";

/// Fallback device labels when nothing was learned from the bus
pub const DEFAULT_DEVICE_NAME: &str = "Open3E System";
pub const DEFAULT_DEVICE_MODEL: &str = "E3 Controller";

/// Identifier that always carries the device serial number (IdentNumber)
pub const SERIAL_IDENTIFIER: u32 = 377;

/// Type name marking identification-only datapoints
pub const DEVICE_INFO_TYPE: &str = "device_info";

/// Sub-path that triggers the associated climate entity by default
pub const DEFAULT_CLIMATE_TRIGGER: &str = "Mode/ID";

/// Sub-path of the operation-mode state reported by a heating circuit
pub const MODE_STATE_SUB_PATH: &str = "Mode/ID";

/// Payload sent by stateless button entities
pub const PAYLOAD_PRESS: &str = "PRESS";

/// Write mode used when a datapoint does not declare one
pub const DEFAULT_WRITE_MODE: &str = "write";

/// Language the configuration names are written in
pub const DEFAULT_LANGUAGE: &str = "en";

/// Area suggested for every device unless translated
pub const DEFAULT_SUGGESTED_AREA: &str = "Heating";

/// Origin block naming the bridge
pub mod origin {
    pub const NAME: &str = "Open3E Bridge";
    pub const SUPPORT_URL: &str = "https://github.com/open3e/open3e-bridge";
}
