//! Home Assistant MQTT discovery for Open3E
//!
//! [`DiscoveryGenerator::generate`] maps one Open3E telemetry message onto
//! the retained discovery configurations the hub needs to create entities:
//!
//! ```ignore
//! use e3_discovery::{DiscoveryGenerator, GeneratorOptions};
//!
//! let generator = DiscoveryGenerator::new(config, GeneratorOptions::default());
//! for (topic, payload) in generator.generate(
//!     "open3e/680_268_FlowTemperatureSensor/Actual",
//!     "42.5",
//!     false,
//! ) {
//!     client.publish(topic, payload, true)?;
//! }
//! ```
//!
//! The only mutable state is the [`DeviceRegistry`], which learns device
//! names, serials and firmware versions from identification datapoints as
//! they pass through.

mod climate;
mod descriptor;
mod device_registry;
mod generator;
mod names;

pub use climate::CLIMATE_SUB_ITEM;
pub use descriptor::{DeviceInfo, DiscoveryMessage, EntityConfig, Origin};
pub use device_registry::{DeviceRecord, DeviceRegistry};
pub use generator::{default_command_template, DiscoveryGenerator, GeneratorOptions};
pub use names::NameResolver;
