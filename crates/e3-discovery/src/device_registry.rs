//! Device Registry
//!
//! Learns device identity (name, model, serial, firmware) per ECU address
//! from identification datapoints and builds the device block attached to
//! every entity of that ECU.

use std::sync::Arc;

use dashmap::DashMap;
use e3_config::{Configuration, IdentificationRule};
use e3_core::{MANUFACTURER, ROOT_TOPIC, SERIAL_IDENTIFIER};
use tracing::{debug, info};

use crate::descriptor::DeviceInfo;

/// What has been learned about one ECU
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub sw_version: Option<String>,
}

impl DeviceRecord {
    /// Field-level merge: only fields present in `other` are replaced
    fn merge(&mut self, other: DeviceRecord) {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.serial.is_some() {
            self.serial = other.serial;
        }
        if other.sw_version.is_some() {
            self.sw_version = other.sw_version;
        }
    }
}

/// Per-ECU device identity cache
pub struct DeviceRegistry {
    config: Arc<Configuration>,
    devices: DashMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            devices: DashMap::new(),
        }
    }

    /// Record an identification value.
    ///
    /// Returns `false` when `identifier` is not an identification datapoint.
    pub fn observe(&self, device_addr: &str, identifier: u32, value: &str) -> bool {
        let Some(rule) = self.config.identification_rule(identifier) else {
            return false;
        };

        let update = self.extract(identifier, rule, value.trim());
        debug!(
            "Device info from DID {} on {}: {:?}",
            identifier, device_addr, update
        );

        let mut record = self.devices.entry(device_addr.to_string()).or_default();
        let before = record.clone();
        record.merge(update);
        if *record != before {
            info!("Updated device {}: {:?}", device_addr, *record);
        }

        true
    }

    fn extract(&self, identifier: u32, rule: &IdentificationRule, value: &str) -> DeviceRecord {
        let mut record = DeviceRecord::default();

        if rule.extract_name {
            let (name, model) = self.match_device(value);
            record.name = Some(name);
            record.model = Some(model);
        }
        // A blank serial or firmware string never replaces a learned one
        if value.is_empty() {
            return record;
        }
        if identifier == SERIAL_IDENTIFIER || rule.extract_serial {
            record.serial = Some(value.to_string());
        }
        if rule.extract_sw_version {
            record.sw_version = Some(value.to_string());
        }

        record
    }

    /// Name and model for a reported device string; the first matching
    /// pattern wins.
    fn match_device(&self, value: &str) -> (String, String) {
        if let Some(pattern) = self
            .config
            .device_patterns()
            .iter()
            .find(|p| p.regex.is_match(value))
        {
            return (
                pattern.name.clone().unwrap_or_else(|| value.to_string()),
                pattern
                    .model
                    .clone()
                    .unwrap_or_else(|| pattern.pattern().to_string()),
            );
        }

        let clean: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
            .collect();
        let clean = clean.trim();

        if clean.is_empty() {
            let default = self.config.default_device();
            (default.name.clone(), default.model.clone())
        } else {
            (clean.to_string(), clean.to_string())
        }
    }

    /// Snapshot of what is known about `device_addr`
    pub fn get(&self, device_addr: &str) -> Option<DeviceRecord> {
        self.devices.get(device_addr).map(|r| r.clone())
    }

    /// Device block for `device_addr`. `name_override` takes precedence over
    /// any learned name.
    pub fn device_info(&self, device_addr: &str, name_override: Option<&str>) -> DeviceInfo {
        let record = self.get(device_addr).unwrap_or_default();

        let name = name_override
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .or_else(|| record.name.clone());

        let (name, model) = match name {
            Some(name) => {
                let model = record.model.clone().unwrap_or_else(|| name.clone());
                (name, model)
            }
            None => {
                let default = self.config.default_device();
                (default.name.clone(), default.model.clone())
            }
        };

        let mut identifiers = Vec::with_capacity(2);
        if let Some(serial) = &record.serial {
            identifiers.push(format!("{}_{}", ROOT_TOPIC, serial));
        }
        identifiers.push(format!("{}_{}", ROOT_TOPIC, device_addr));

        DeviceInfo {
            identifiers,
            name,
            manufacturer: MANUFACTURER.to_string(),
            model,
            sw_version: record.sw_version,
            suggested_area: self.suggested_area(),
        }
    }

    fn suggested_area(&self) -> String {
        self.config
            .translations()
            .string("suggested_area", Some(e3_core::DEFAULT_SUGGESTED_AREA))
    }

    /// Number of known devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e3_config::ConfigSources;

    fn registry() -> DeviceRegistry {
        let datapoints = serde_yaml::from_str(
            r#"
device_identification_dids:
  256: {}
  377: {extract_serial: true, extract_name: false}
  580: {extract_sw_version: true, extract_name: false}
  600: {}
device_patterns:
  - pattern: "vitocal\\s*25\\d"
    name: Vitocal 250-A
    model: Vitocal 250-A
  - pattern: "vitodens"
default_device:
  name: Open3E System
  model: E3 Controller
"#,
        )
        .unwrap();
        let config = Configuration::new(ConfigSources::new("en").with_datapoints(datapoints));
        DeviceRegistry::new(Arc::new(config))
    }

    #[test]
    fn test_unknown_device_uses_defaults() {
        let registry = registry();
        let info = registry.device_info("680", None);
        assert_eq!(info.identifiers, vec!["open3e_680"]);
        assert_eq!(info.name, "Open3E System");
        assert_eq!(info.model, "E3 Controller");
        assert_eq!(info.manufacturer, "Viessmann");
        assert_eq!(info.sw_version, None);
        assert_eq!(info.suggested_area, "Heating");
    }

    #[test]
    fn test_pattern_match() {
        let registry = registry();
        assert!(registry.observe("680", 256, "VITOCAL 252-A"));
        let info = registry.device_info("680", None);
        assert_eq!(info.name, "Vitocal 250-A");
        assert_eq!(info.model, "Vitocal 250-A");
    }

    #[test]
    fn test_pattern_defaults() {
        let registry = registry();
        registry.observe("680", 256, "Vitodens 200-W");
        let record = registry.get("680").unwrap();
        assert_eq!(record.name.as_deref(), Some("Vitodens 200-W"));
        assert_eq!(record.model.as_deref(), Some("vitodens"));
    }

    #[test]
    fn test_fallback_cleans_value() {
        let registry = registry();
        registry.observe("680", 256, "  E3*Box_#1 ");
        let record = registry.get("680").unwrap();
        assert_eq!(record.name.as_deref(), Some("E3Box1"));

        registry.observe("681", 600, "#*!");
        let record = registry.get("681").unwrap();
        assert_eq!(record.name.as_deref(), Some("Open3E System"));
        assert_eq!(record.model.as_deref(), Some("E3 Controller"));
    }

    #[test]
    fn test_blank_value_uses_default_label() {
        let registry = registry();
        assert!(registry.observe("680", 256, "   "));
        let record = registry.get("680").unwrap();
        assert_eq!(record.name.as_deref(), Some("Open3E System"));
        assert_eq!(record.model.as_deref(), Some("E3 Controller"));

        registry.observe("680", 377, "7571381573112225");
        registry.observe("680", 377, " ");
        registry.observe("680", 580, "");
        let info = registry.device_info("680", None);
        assert_eq!(
            info.identifiers,
            vec!["open3e_7571381573112225", "open3e_680"]
        );
        assert_eq!(info.sw_version, None);
    }

    #[test]
    fn test_serial_and_firmware_merge() {
        let registry = registry();
        registry.observe("680", 256, "Vitocal 250");
        registry.observe("680", 377, "7571381573112225");
        registry.observe("680", 580, "1.2.3");

        let info = registry.device_info("680", None);
        assert_eq!(
            info.identifiers,
            vec!["open3e_7571381573112225", "open3e_680"]
        );
        assert_eq!(info.name, "Vitocal 250-A");
        assert_eq!(info.sw_version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_devices_are_per_address() {
        let registry = registry();
        registry.observe("680", 256, "Vitocal 250");
        assert_eq!(registry.device_info("6a1", None).name, "Open3E System");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_override() {
        let registry = registry();
        let info = registry.device_info("680", Some("Keller"));
        assert_eq!(info.name, "Keller");
        assert_eq!(info.model, "Keller");
    }

    #[test]
    fn test_non_identification_ignored() {
        let registry = registry();
        assert!(!registry.observe("680", 268, "Vitocal"));
        assert!(registry.is_empty());
    }
}
