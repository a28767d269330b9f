//! User-supplied entity names
//!
//! `user/names.yaml` maps a datapoint identifier either to one name for all
//! of its entities, or to a table of names per sub-item:
//!
//! ```yaml
//! names:
//!   396: WW Soll
//!   268:
//!     Actual: Vorlauf Ist
//! ```

use crate::model::parse_identifier;
use serde_yaml::Value;
use std::collections::HashMap;
use tracing::debug;

/// Override configured for one datapoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOverride {
    /// Replaces the name of every entity of the datapoint
    Flat(String),
    /// Replaces the names of the listed sub-items only
    PerSub(HashMap<String, String>),
}

#[derive(Debug, Clone, Default)]
pub struct UserNames {
    overrides: HashMap<u32, NameOverride>,
}

impl UserNames {
    pub fn from_value(value: &Value) -> Self {
        let Some(Value::Mapping(names)) = value.get("names") else {
            return Self::default();
        };

        let overrides = names
            .iter()
            .filter_map(|(key, value)| {
                let id = parse_identifier(key)?;
                let entry = match value {
                    Value::String(name) => NameOverride::Flat(name.clone()),
                    Value::Mapping(subs) => NameOverride::PerSub(
                        subs.iter()
                            .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                            .collect(),
                    ),
                    _ => {
                        debug!("Ignoring name override for {}: not a string or mapping", id);
                        return None;
                    }
                };
                Some((id, entry))
            })
            .collect();

        Self { overrides }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&NameOverride> {
        self.overrides.get(&id)
    }

    /// Non-blank override for an entity of datapoint `id`.
    ///
    /// A per-sub entry is consulted only when the entity has a sub-item.
    pub fn lookup(&self, id: u32, sub_item: Option<&str>) -> Option<&str> {
        let name = match (self.overrides.get(&id)?, sub_item) {
            (NameOverride::Flat(name), _) => name.as_str(),
            (NameOverride::PerSub(subs), Some(sub)) => subs.get(sub)?.as_str(),
            (NameOverride::PerSub(_), None) => return None,
        };
        Some(name).filter(|name| !name.trim().is_empty())
    }
}
