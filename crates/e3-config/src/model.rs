//! Configuration model
//!
//! [`Configuration`] is built from already-parsed YAML and never fails:
//! entries that do not have the expected shape are skipped here and
//! reported by [`Configuration::validate`](crate::validate).

use crate::translations::Translations;
use crate::user_names::UserNames;
use e3_core::{
    DEFAULT_CLIMATE_TRIGGER, DEFAULT_DEVICE_MODEL, DEFAULT_DEVICE_NAME, DEFAULT_LANGUAGE,
    DEFAULT_WRITE_MODE, DEVICE_INFO_TYPE,
};
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Raw inputs of a [`Configuration`]
#[derive(Debug, Clone)]
pub struct ConfigSources {
    /// Contents of `datapoints.yaml`
    pub datapoints: Value,
    /// Contents of `templates/types.yaml`
    pub types: Value,
    /// Language overlay, `Null` for the default language
    pub translations: Value,
    /// User name overrides, `Null` when absent
    pub user_names: Value,
    /// Selected language code
    pub language: String,
}

impl ConfigSources {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            datapoints: Value::Null,
            types: Value::Null,
            translations: Value::Null,
            user_names: Value::Null,
            language: language.into(),
        }
    }

    pub fn with_datapoints(mut self, datapoints: Value) -> Self {
        self.datapoints = datapoints;
        self
    }

    pub fn with_types(mut self, types: Value) -> Self {
        self.types = types;
        self
    }

    pub fn with_translations(mut self, translations: Value) -> Self {
        self.translations = translations;
        self
    }

    pub fn with_user_names(mut self, user_names: Value) -> Self {
        self.user_names = user_names;
        self
    }
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

/// Which fields an identification datapoint contributes to its device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentificationRule {
    pub extract_serial: bool,
    pub extract_sw_version: bool,
    pub extract_name: bool,
}

impl Default for IdentificationRule {
    fn default() -> Self {
        Self {
            extract_serial: false,
            extract_sw_version: false,
            extract_name: true,
        }
    }
}

/// Model-string pattern mapping a reported device name to friendly labels
#[derive(Debug, Clone)]
pub struct DevicePattern {
    pub regex: Regex,
    pub name: Option<String>,
    pub model: Option<String>,
}

impl DevicePattern {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

#[derive(Debug, Deserialize)]
struct RawDevicePattern {
    pattern: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Labels used when no identification value was seen for a device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DefaultDevice {
    pub name: String,
    pub model: String,
}

impl Default for DefaultDevice {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            model: DEFAULT_DEVICE_MODEL.to_string(),
        }
    }
}

/// Immutable, validated-on-demand view of all configuration inputs
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) language: String,
    pub(crate) root: Mapping,
    pub(crate) raw_types: Value,
    pub(crate) datapoints: IndexMap<u32, Mapping>,
    pub(crate) types: IndexMap<String, Mapping>,
    pub(crate) ignored: HashSet<u32>,
    pub(crate) write_blacklist: HashSet<u32>,
    pub(crate) identification: HashMap<u32, IdentificationRule>,
    pub(crate) device_patterns: Vec<DevicePattern>,
    pub(crate) pattern_errors: Vec<String>,
    pub(crate) default_device: DefaultDevice,
    pub(crate) translations: Translations,
    pub(crate) user_names: UserNames,
}

impl Configuration {
    pub fn new(sources: ConfigSources) -> Self {
        let root = match sources.datapoints {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                warn!("datapoints file is not a mapping: {:?}", other);
                Mapping::new()
            }
        };

        let mut datapoints = IndexMap::new();
        if let Some(Value::Mapping(section)) = root.get("datapoints") {
            for (key, value) in section {
                match (parse_identifier(key), value) {
                    (Some(id), Value::Mapping(map)) => {
                        datapoints.insert(id, map.clone());
                    }
                    _ => debug!("Skipping malformed datapoint entry {:?}", key),
                }
            }
        }

        let mut types = IndexMap::new();
        if let Value::Mapping(section) = &sources.types {
            for (key, value) in section {
                let Some(name) = key.as_str() else { continue };
                match value {
                    Value::Mapping(map) => {
                        types.insert(name.to_string(), map.clone());
                    }
                    Value::Null => {
                        types.insert(name.to_string(), Mapping::new());
                    }
                    _ => debug!("Skipping malformed type template '{}'", name),
                }
            }
        }

        let (device_patterns, pattern_errors) = parse_device_patterns(root.get("device_patterns"));

        let default_device = root
            .get("default_device")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
            .unwrap_or_default();

        debug!(
            "Configuration: {} datapoints, {} types, language '{}'",
            datapoints.len(),
            types.len(),
            sources.language
        );

        Self {
            ignored: identifier_set(root.get("ignored_dids")),
            write_blacklist: identifier_set(root.get("write_blacklisted_dids")),
            identification: parse_identification(root.get("device_identification_dids")),
            translations: Translations::new(&sources.language, &sources.translations),
            user_names: UserNames::from_value(&sources.user_names),
            language: sources.language,
            raw_types: sources.types,
            root,
            datapoints,
            types,
            device_patterns,
            pattern_errors,
            default_device,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn datapoint(&self, id: u32) -> Option<Datapoint<'_>> {
        self.datapoints
            .get(&id)
            .map(|raw| Datapoint { id, raw })
    }

    /// All well-formed datapoints in file order
    pub fn datapoints(&self) -> impl Iterator<Item = Datapoint<'_>> {
        self.datapoints
            .iter()
            .map(|(id, raw)| Datapoint { id: *id, raw })
    }

    pub fn type_template(&self, name: &str) -> Option<&Mapping> {
        self.types.get(name)
    }

    pub fn is_ignored(&self, id: u32) -> bool {
        self.ignored.contains(&id)
    }

    pub fn is_write_blacklisted(&self, id: u32) -> bool {
        self.write_blacklist.contains(&id)
    }

    /// Identification rule for `id`, if it is an identification datapoint
    pub fn identification_rule(&self, id: u32) -> Option<&IdentificationRule> {
        self.identification.get(&id)
    }

    pub fn device_patterns(&self) -> &[DevicePattern] {
        &self.device_patterns
    }

    pub fn default_device(&self) -> &DefaultDevice {
        &self.default_device
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    pub fn user_names(&self) -> &UserNames {
        &self.user_names
    }
}

/// A configured datapoint
#[derive(Debug, Clone, Copy)]
pub struct Datapoint<'a> {
    id: u32,
    raw: &'a Mapping,
}

impl<'a> Datapoint<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn raw(&self) -> &'a Mapping {
        self.raw
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.raw.get(key)
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.get_str("type")
    }

    pub fn is_device_info(&self) -> bool {
        self.type_name() == Some(DEVICE_INFO_TYPE)
    }

    /// Declared canonical name
    pub fn name(&self) -> Option<&'a str> {
        self.get_str("name")
    }

    /// Translation key used when no literal name is declared
    pub fn name_key(&self) -> Option<&'a str> {
        self.get_str("name_key")
    }

    /// Name the entity is titled with: `name`, else `name_key`
    pub fn base_name(&self) -> Option<&'a str> {
        self.name().or_else(|| self.name_key())
    }

    /// Explicit `writable` flag, if any
    pub fn writable(&self) -> Option<bool> {
        self.get("writable").and_then(Value::as_bool)
    }

    pub fn write_mode(&self) -> &'a str {
        self.get_str("write_mode").unwrap_or(DEFAULT_WRITE_MODE)
    }

    /// Sub-item table; `None` when absent, empty or malformed
    pub fn subs(&self) -> Option<&'a Mapping> {
        match self.get("subs") {
            Some(Value::Mapping(map)) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    pub fn has_subs(&self) -> bool {
        self.subs().is_some()
    }

    /// Configuration of sub-item `name`.
    ///
    /// A sub-item that is not listed, or listed without a mapping, has
    /// default settings.
    pub fn sub(&self, name: &'a str) -> SubItem<'a> {
        let raw = self
            .subs()
            .and_then(|subs| subs.get(name))
            .and_then(Value::as_mapping);
        SubItem { name, raw }
    }

    pub fn climate(&self) -> Option<ClimateBlock<'a>> {
        match self.get("climate") {
            Some(Value::Mapping(raw)) => Some(ClimateBlock { raw }),
            _ => None,
        }
    }

    /// Exclusive `(min, max)` interval of values the device must never receive
    pub fn forbidden_range(&self) -> Option<(f64, f64)> {
        let range = self.get("forbidden_range")?.as_mapping()?;
        let min = range.get("min").and_then(as_number)?;
        let max = range.get("max").and_then(as_number)?;
        Some((min, max))
    }

    fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Settings of one sub-item of a datapoint
#[derive(Debug, Clone, Copy)]
pub struct SubItem<'a> {
    name: &'a str,
    raw: Option<&'a Mapping>,
}

impl<'a> SubItem<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn raw(&self) -> Option<&'a Mapping> {
        self.raw
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.raw.and_then(|raw| raw.get(key))
    }

    pub fn is_enabled(&self) -> bool {
        self.get("enabled").and_then(Value::as_bool).unwrap_or(true)
    }

    /// Suffix key used for naming, defaults to the sub-item name
    pub fn suffix_key(&self) -> &'a str {
        self.get("type")
            .and_then(Value::as_str)
            .unwrap_or(self.name)
    }

    pub fn entity_type(&self) -> Option<&'a str> {
        self.get("entity_type").and_then(Value::as_str)
    }

    pub fn writable(&self) -> Option<bool> {
        self.get("writable").and_then(Value::as_bool)
    }
}

/// Climate entity settings attached to a datapoint
#[derive(Debug, Clone, Copy)]
pub struct ClimateBlock<'a> {
    raw: &'a Mapping,
}

impl<'a> ClimateBlock<'a> {
    pub fn raw(&self) -> &'a Mapping {
        self.raw
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.raw.get(key)
    }

    pub fn trigger_sub(&self) -> &'a str {
        self.get("trigger_sub")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CLIMATE_TRIGGER)
    }

    /// Whether a telemetry sub-path triggers this climate entity
    pub fn is_triggered_by(&self, sub_path: Option<&str>) -> bool {
        sub_path
            .map(|sub| sub.to_lowercase().starts_with(&self.trigger_sub().to_lowercase()))
            .unwrap_or(false)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn name_key(&self) -> Option<&'a str> {
        self.get("name_key")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn temperature_did(&self) -> Option<u32> {
        self.get("temperature_did").and_then(parse_identifier)
    }

    pub fn temperature_did_name(&self) -> Option<&'a str> {
        self.get("temperature_did_name").and_then(Value::as_str)
    }

    pub fn modes(&self) -> Option<&'a Vec<Value>> {
        self.get("modes").and_then(Value::as_sequence)
    }
}

/// Parse a YAML key or value as a datapoint identifier
pub fn parse_identifier(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn identifier_set(value: Option<&Value>) -> HashSet<u32> {
    value
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(parse_identifier).collect())
        .unwrap_or_default()
}

fn parse_identification(value: Option<&Value>) -> HashMap<u32, IdentificationRule> {
    let Some(Value::Mapping(map)) = value else {
        return HashMap::new();
    };

    map.iter()
        .filter_map(|(key, rule)| {
            let id = parse_identifier(key)?;
            let rule = match rule {
                Value::Null => IdentificationRule::default(),
                other => serde_yaml::from_value(other.clone()).unwrap_or_else(|e| {
                    debug!("Malformed identification rule for {}: {}", id, e);
                    IdentificationRule::default()
                }),
            };
            Some((id, rule))
        })
        .collect()
}

fn parse_device_patterns(value: Option<&Value>) -> (Vec<DevicePattern>, Vec<String>) {
    let mut patterns = Vec::new();
    let mut errors = Vec::new();

    let Some(Value::Sequence(entries)) = value else {
        return (patterns, errors);
    };

    for (index, entry) in entries.iter().enumerate() {
        let raw: RawDevicePattern = match serde_yaml::from_value(entry.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                errors.push(format!("device pattern #{}: {}", index, e));
                continue;
            }
        };

        match RegexBuilder::new(&raw.pattern).case_insensitive(true).build() {
            Ok(regex) => patterns.push(DevicePattern {
                regex,
                name: raw.name,
                model: raw.model,
            }),
            Err(e) => {
                warn!("Skipping invalid device pattern '{}': {}", raw.pattern, e);
                errors.push(format!("device pattern '{}': {}", raw.pattern, e));
            }
        }
    }

    (patterns, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(datapoints: &str) -> Configuration {
        Configuration::new(
            ConfigSources::new("en").with_datapoints(serde_yaml::from_str(datapoints).unwrap()),
        )
    }

    #[test]
    fn test_datapoints_keep_file_order() {
        let config = config(
            r#"
datapoints:
  318: {type: pressure}
  268: {type: temperature}
  "2496": {type: power}
"#,
        );
        let ids: Vec<u32> = config.datapoints().map(|dp| dp.id()).collect();
        assert_eq!(ids, vec![318, 268, 2496]);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let config = config(
            r#"
datapoints:
  abc: {type: pressure}
  -5: {type: pressure}
  268: not a mapping
  269: {type: temperature}
"#,
        );
        assert_eq!(config.datapoints().count(), 1);
        assert!(config.datapoint(268).is_none());
        assert!(config.datapoint(269).is_some());
    }

    #[test]
    fn test_identifier_lists() {
        let config = config(
            r#"
ignored_dids: [540, "541", bogus]
write_blacklisted_dids: [875]
"#,
        );
        assert!(config.is_ignored(540));
        assert!(config.is_ignored(541));
        assert!(!config.is_ignored(875));
        assert!(config.is_write_blacklisted(875));
    }

    #[test]
    fn test_identification_rules() {
        let config = config(
            r#"
device_identification_dids:
  256:
  377: {extract_serial: true}
  580: {extract_sw_version: true, extract_name: false}
"#,
        );
        assert_eq!(
            config.identification_rule(256),
            Some(&IdentificationRule::default())
        );
        assert!(config.identification_rule(377).unwrap().extract_serial);
        let rule = config.identification_rule(580).unwrap();
        assert!(rule.extract_sw_version);
        assert!(!rule.extract_name);
        assert!(config.identification_rule(268).is_none());
    }

    #[test]
    fn test_device_patterns() {
        let config = config(
            r#"
device_patterns:
  - pattern: "vitocal"
    name: Vitocal
  - pattern: "("
    name: Broken
"#,
        );
        assert_eq!(config.device_patterns().len(), 1);
        assert!(config.device_patterns()[0].regex.is_match("VITOCAL 250"));
        assert_eq!(config.pattern_errors.len(), 1);
    }

    #[test]
    fn test_default_device() {
        let config = config("datapoints: {}");
        assert_eq!(config.default_device().name, DEFAULT_DEVICE_NAME);
        assert_eq!(config.default_device().model, DEFAULT_DEVICE_MODEL);

        let config = config_with_default();
        assert_eq!(config.default_device().name, "Heat Pump");
        assert_eq!(config.default_device().model, DEFAULT_DEVICE_MODEL);
    }

    fn config_with_default() -> Configuration {
        config("default_device: {name: Heat Pump}")
    }

    #[test]
    fn test_sub_items() {
        let config = config(
            r#"
datapoints:
  268:
    name: Flow Temperature
    type: temperature
    subs:
      Actual: {type: current}
      Unknown: {enabled: false}
      Bare:
"#,
        );
        let dp = config.datapoint(268).unwrap();
        assert!(dp.has_subs());
        assert_eq!(dp.sub("Actual").suffix_key(), "current");
        assert!(dp.sub("Actual").is_enabled());
        assert!(!dp.sub("Unknown").is_enabled());
        assert_eq!(dp.sub("Bare").suffix_key(), "Bare");
        assert_eq!(dp.sub("Missing").suffix_key(), "Missing");
        assert!(dp.sub("Missing").is_enabled());
    }

    #[test]
    fn test_climate_trigger() {
        let config = config(
            r#"
datapoints:
  1415:
    type: status
    climate:
      temperature_did: "1643"
"#,
        );
        let climate = config.datapoint(1415).unwrap().climate().unwrap();
        assert_eq!(climate.trigger_sub(), DEFAULT_CLIMATE_TRIGGER);
        assert!(climate.is_triggered_by(Some("Mode/ID")));
        assert!(climate.is_triggered_by(Some("mode/id")));
        assert!(!climate.is_triggered_by(Some("State/ID")));
        assert!(!climate.is_triggered_by(None));
        assert_eq!(climate.temperature_did(), Some(1643));
    }

    #[test]
    fn test_forbidden_range() {
        let config = config(
            r#"
datapoints:
  2626:
    type: power_setpoint
    forbidden_range: {min: 0, max: 5}
"#,
        );
        assert_eq!(
            config.datapoint(2626).unwrap().forbidden_range(),
            Some((0.0, 5.0))
        );
    }
}
