//! Entity kinds understood by the hub's MQTT discovery

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ROOT_TOPIC;

/// Error type for unknown entity kinds
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity kind '{0}'")]
pub struct EntityKindError(pub String);

/// Discovery component of a generated entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    BinarySensor,
    Switch,
    Number,
    Select,
    Button,
    Climate,
}

impl EntityKind {
    /// Discovery component name used in the config topic
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensor",
            EntityKind::BinarySensor => "binary_sensor",
            EntityKind::Switch => "switch",
            EntityKind::Number => "number",
            EntityKind::Select => "select",
            EntityKind::Button => "button",
            EntityKind::Climate => "climate",
        }
    }

    /// Whether the kind sends commands back to the bus
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            EntityKind::Switch | EntityKind::Number | EntityKind::Select | EntityKind::Button
        )
    }

    /// Whether the kind reports a state topic
    pub fn has_state(&self) -> bool {
        !matches!(self, EntityKind::Button)
    }

    /// Read-only counterpart used when writing is not permitted.
    ///
    /// Buttons have no read side and return `None`.
    pub fn read_only(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Number | EntityKind::Select => Some(EntityKind::Sensor),
            EntityKind::Switch => Some(EntityKind::BinarySensor),
            EntityKind::Button => None,
            other => Some(*other),
        }
    }
}

impl FromStr for EntityKind {
    type Err = EntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(EntityKind::Sensor),
            "binary_sensor" => Ok(EntityKind::BinarySensor),
            "switch" => Ok(EntityKind::Switch),
            "number" => Ok(EntityKind::Number),
            "select" => Ok(EntityKind::Select),
            "button" => Ok(EntityKind::Button),
            "climate" => Ok(EntityKind::Climate),
            other => Err(EntityKindError(other.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the stable object id for an entity.
///
/// `open3e_<addr>_<id>[_<sub>]`, lower-cased, with every run of characters
/// outside `[a-z0-9_]` collapsed to a single underscore. A sub-item named
/// `unknown` (any case) does not contribute a suffix.
///
/// The whole id is sanitised, not only the sub-item. Open3E addresses are
/// hex digits, so for them this is the same as sanitising the sub-item
/// alone; an address with other characters (`6A1`, `a-b`) is lower-cased
/// and collapsed as well.
pub fn object_id(device_addr: &str, identifier: u32, sub_item: Option<&str>) -> String {
    let mut raw = format!("{}_{}_{}", ROOT_TOPIC, device_addr, identifier);
    if let Some(sub) = sub_item {
        if !sub.is_empty() && !sub.eq_ignore_ascii_case("unknown") {
            raw.push('_');
            raw.push_str(sub);
        }
    }
    sanitize(&raw)
}

fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}
