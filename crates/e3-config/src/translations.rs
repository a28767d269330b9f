//! Language overlays
//!
//! Every lookup walks a short chain of sources and takes the first hit:
//!
//! | lookup   | chain                                        |
//! |----------|----------------------------------------------|
//! | names    | overlay `names` → key                        |
//! | suffixes | overlay `suffixes` → built-in English → key  |
//! | strings  | overlay `strings` → caller fallback → key    |
//!
//! The default language carries no overlay, so the chains collapse to the
//! built-in and identity steps.

use crate::model::parse_identifier;
use e3_core::DEFAULT_LANGUAGE;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

/// English suffixes for the sub-item types Open3E reports
pub const ENGLISH_SUFFIXES: &[(&str, &str)] = &[
    ("current", "Current"),
    ("min", "Minimum"),
    ("max", "Maximum"),
    ("avg", "Average"),
    ("unknown", "Unknown"),
    ("error", "Error"),
    ("setpoint", "Setpoint"),
    ("state", "State"),
];

/// One link of a lookup chain
enum Source<'a> {
    Overlay(&'a HashMap<String, String>),
    Builtin(&'static [(&'static str, &'static str)]),
    Fallback(Option<&'a str>),
}

impl Source<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        match self {
            Source::Overlay(map) => map.get(key).cloned(),
            Source::Builtin(table) => table
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()),
            Source::Fallback(value) => value.map(str::to_string),
        }
    }
}

/// First hit along `chain`, else the key itself
fn resolve(chain: &[Source<'_>], key: &str) -> String {
    chain
        .iter()
        .find_map(|source| source.lookup(key))
        .unwrap_or_else(|| key.to_string())
}

/// Loaded overlay for one language
#[derive(Debug, Clone, Default)]
pub struct Translations {
    language: String,
    names: HashMap<String, String>,
    suffixes: HashMap<String, String>,
    strings: HashMap<String, String>,
    value_templates: HashMap<u32, String>,
}

impl Translations {
    /// Build from a parsed overlay file. The overlay is ignored for the
    /// default language.
    pub fn new(language: &str, overlay: &Value) -> Self {
        let mut translations = Self {
            language: language.to_string(),
            ..Default::default()
        };

        if language == DEFAULT_LANGUAGE {
            return translations;
        }

        translations.names = string_table(overlay.get("names"));
        translations.suffixes = string_table(overlay.get("suffixes"));
        translations.strings = string_table(overlay.get("strings"));
        translations.value_templates = overlay
            .get("value_templates")
            .and_then(Value::as_mapping)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| Some((parse_identifier(k)?, v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "Translations '{}': {} names, {} suffixes, {} value templates",
            language,
            translations.names.len(),
            translations.suffixes.len(),
            translations.value_templates.len()
        );

        translations
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_default_language(&self) -> bool {
        self.language == DEFAULT_LANGUAGE
    }

    /// Whether the overlay translates `key`
    pub fn has_name(&self, key: &str) -> bool {
        self.names.contains_key(key)
    }

    /// Translated entity name, or `key` unchanged
    pub fn name(&self, key: &str) -> String {
        resolve(&[Source::Overlay(&self.names)], key)
    }

    /// Translated sub-item suffix
    pub fn suffix(&self, key: &str) -> String {
        resolve(
            &[
                Source::Overlay(&self.suffixes),
                Source::Builtin(ENGLISH_SUFFIXES),
            ],
            key,
        )
    }

    /// Translated UI string with a caller-supplied fallback
    pub fn string(&self, key: &str, fallback: Option<&str>) -> String {
        resolve(
            &[Source::Overlay(&self.strings), Source::Fallback(fallback)],
            key,
        )
    }

    /// Language-specific replacement for a datapoint's value template
    pub fn value_template(&self, id: u32) -> Option<&str> {
        self.value_templates.get(&id).map(String::as_str)
    }

    /// All language-specific value templates
    pub fn value_templates(&self) -> impl Iterator<Item = (u32, &str)> {
        self.value_templates
            .iter()
            .map(|(id, template)| (*id, template.as_str()))
    }
}

fn string_table(value: Option<&Value>) -> HashMap<String, String> {
    let Some(Value::Mapping(map)) = value else {
        return HashMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
        .collect()
}
