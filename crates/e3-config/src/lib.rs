//! Configuration for the Open3E discovery bridge
//!
//! The bridge is driven entirely by YAML data:
//!
//! - `datapoints.yaml` - per-identifier definitions, ignore/blacklist
//!   sets, device identification rules and device patterns
//! - `templates/types.yaml` - named type templates
//! - `translations/<lang>.yaml` - optional language overlay
//! - `user/names.yaml` - optional user name overrides
//!
//! # Example
//!
//! ```ignore
//! use e3_config::Configuration;
//!
//! let config = Configuration::load("config", "de")?;
//! let report = config.validate();
//! if !report.is_valid() {
//!     eprintln!("{}", report);
//! }
//! ```

mod error;
pub mod loader;
pub mod merge;
mod model;
pub mod translations;
mod user_names;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_sources, load_yaml, YamlLoader};
pub use model::{
    parse_identifier, ClimateBlock, ConfigSources, Configuration, Datapoint, DefaultDevice,
    DevicePattern, IdentificationRule, SubItem,
};
pub use translations::Translations;
pub use user_names::{NameOverride, UserNames};
pub use validate::{ValidationReport, TEMPLATE_KEYS};

// Re-export serde_yaml types used in the public API
pub use serde_yaml::{Mapping, Value};

use std::path::Path;

impl Configuration {
    /// Load every configuration file for `language` from `config_dir`
    pub fn load(config_dir: impl AsRef<Path>, language: &str) -> ConfigResult<Self> {
        Ok(Self::new(load_sources(config_dir, language)?))
    }
}
