//! Configuration validation
//!
//! Validation never aborts: every problem found is collected into a
//! [`ValidationReport`]. Errors describe configuration that would produce
//! wrong or unsafe entities; warnings describe gaps such as untranslated
//! names.

use crate::model::{as_number, parse_identifier, Configuration};
use e3_core::DEVICE_INFO_TYPE;
use serde_yaml::{Mapping, Value};
use std::fmt;
use tracing::debug;

#[cfg(feature = "template-check")]
use e3_template::{CommandRender, TemplateEngine};

/// Keys holding templates, checked wherever they appear
pub const TEMPLATE_KEYS: &[&str] = &[
    "value_template",
    "command_template",
    "mode_state_template",
    "mode_command_template",
    "temperature_command_template",
];

const NUMERIC_KEYS: &[&str] = &["min", "max", "step"];

/// Upper bound on values rendered inside a forbidden range
#[cfg(feature = "template-check")]
const MAX_RANGE_SAMPLES: i64 = 256;

/// Largest forbidden_range bound whose integers are exact in an f64
#[cfg(feature = "template-check")]
const MAX_RANGE_BOUND: f64 = 9_007_199_254_740_991.0;

/// Errors and warnings found in a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "error: {}", error)?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {}", warning)?;
        }
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )
    }
}

/// Where in a datapoint a value was found, for messages
#[derive(Clone, Copy)]
enum Scope<'a> {
    Datapoint,
    Sub(&'a str),
    Climate,
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Datapoint => Ok(()),
            Scope::Sub(name) => write!(f, " in sub '{}'", name),
            Scope::Climate => f.write_str(" in climate"),
        }
    }
}

struct Validator<'c> {
    config: &'c Configuration,
    report: ValidationReport,
    #[cfg(feature = "template-check")]
    engine: TemplateEngine,
}

impl Configuration {
    /// Check the configuration for structural and semantic problems
    pub fn validate(&self) -> ValidationReport {
        let mut validator = Validator {
            config: self,
            report: ValidationReport::default(),
            #[cfg(feature = "template-check")]
            engine: TemplateEngine::new(),
        };

        validator.check_identifier_list("ignored_dids");
        validator.check_identifier_list("write_blacklisted_dids");
        validator.check_types();
        validator.check_datapoints();
        validator.check_translation_templates();

        for message in &self.pattern_errors {
            validator.report.error(message.clone());
        }

        debug!(
            "Validation finished: {} errors, {} warnings",
            validator.report.errors.len(),
            validator.report.warnings.len()
        );
        validator.report
    }
}

impl<'c> Validator<'c> {
    fn check_identifier_list(&mut self, key: &str) {
        let config = self.config;
        match config.root.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::Sequence(entries)) => {
                for entry in entries {
                    if parse_identifier(entry).is_none() {
                        self.report
                            .error(format!("{}: entry {:?} is not an integer", key, entry));
                    }
                }
            }
            Some(_) => self.report.error(format!("{} must be a list", key)),
        }
    }

    fn check_types(&mut self) {
        let config = self.config;
        match &config.raw_types {
            Value::Null => self.report.warning("no type templates defined"),
            Value::Mapping(types) => {
                for (name, template) in types {
                    if !matches!(template, Value::Mapping(_) | Value::Null) {
                        self.report
                            .error(format!("type template {:?} must be a mapping", name));
                    }
                }
            }
            _ => self.report.error("type templates must be a mapping"),
        }
    }

    fn check_datapoints(&mut self) {
        let config = self.config;
        let section = match config.root.get("datapoints") {
            None | Some(Value::Null) => {
                self.report.warning("no datapoints defined");
                return;
            }
            Some(Value::Mapping(section)) => section,
            Some(_) => {
                self.report.error("datapoints must be a mapping");
                return;
            }
        };

        for (key, value) in section {
            let Some(id) = parse_identifier(key) else {
                self.report
                    .error(format!("datapoint key {:?} is not a valid identifier", key));
                continue;
            };
            let Value::Mapping(datapoint) = value else {
                self.report
                    .error(format!("DID {}: definition must be a mapping", id));
                continue;
            };
            self.check_datapoint(id, datapoint);
        }
    }

    fn check_datapoint(&mut self, id: u32, datapoint: &Mapping) {
        let type_name = datapoint.get("type").and_then(Value::as_str);
        match type_name {
            None => self.report.error(format!("DID {}: missing type", id)),
            Some(DEVICE_INFO_TYPE) => {}
            Some(name) if self.config.type_template(name).is_none() => {
                self.report
                    .error(format!("DID {}: unknown type '{}'", id, name));
            }
            Some(_) => {}
        }

        let base_name = ["name", "name_key"]
            .iter()
            .filter_map(|key| datapoint.get(*key).and_then(Value::as_str))
            .find(|name| !name.trim().is_empty());

        if type_name != Some(DEVICE_INFO_TYPE) {
            match base_name {
                None => self.report.warning(format!("DID {}: no name defined", id)),
                Some(name) => self.check_translated(id, name),
            }
        }

        self.check_fields(id, datapoint, Scope::Datapoint);

        match datapoint.get("subs") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(subs)) => {
                for (name, sub) in subs {
                    let Some(name) = name.as_str() else {
                        self.report
                            .error(format!("DID {}: sub key {:?} must be a string", id, name));
                        continue;
                    };
                    match sub {
                        Value::Null => {}
                        Value::Mapping(sub) => self.check_fields(id, sub, Scope::Sub(name)),
                        _ => self
                            .report
                            .error(format!("DID {}: sub '{}' must be a mapping", id, name)),
                    }
                }
            }
            Some(_) => self
                .report
                .error(format!("DID {}: subs must be a mapping", id)),
        }

        match datapoint.get("climate") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(climate)) => self.check_climate(id, climate),
            Some(_) => self
                .report
                .error(format!("DID {}: climate must be a mapping", id)),
        }

        self.check_forbidden_range(id, datapoint);
    }

    fn check_translated(&mut self, id: u32, name: &str) {
        let translations = self.config.translations();
        if !translations.is_default_language() && !translations.has_name(name) {
            self.report.warning(format!(
                "DID {}: no '{}' translation for '{}'",
                id,
                translations.language(),
                name
            ));
        }
    }

    fn check_fields(&mut self, id: u32, fields: &Mapping, scope: Scope<'_>) {
        for key in NUMERIC_KEYS {
            if let Some(value) = fields.get(*key) {
                if as_number(value).is_none() {
                    self.report
                        .error(format!("DID {}{}: {} must be numeric", id, scope, key));
                }
            }
        }

        if let Some(options) = fields.get("options") {
            if !options.is_sequence() {
                self.report
                    .error(format!("DID {}{}: options must be a list", id, scope));
            }
        }

        if let Some(entity_type) = fields.get("entity_type") {
            let known = entity_type
                .as_str()
                .and_then(|kind| kind.parse::<e3_core::EntityKind>().ok())
                .map_or(false, |kind| kind != e3_core::EntityKind::Climate);
            if !known {
                self.report.error(format!(
                    "DID {}{}: unsupported entity_type {:?}",
                    id, scope, entity_type
                ));
            }
        }

        self.check_templates(id, fields, scope);
    }

    fn check_climate(&mut self, id: u32, climate: &Mapping) {
        if let Some(key) = climate.get("name_key").and_then(Value::as_str) {
            self.check_translated(id, key);
        }

        for key in ["min_temp", "max_temp", "precision"] {
            if let Some(value) = climate.get(key) {
                if as_number(value).is_none() {
                    self.report
                        .error(format!("DID {} in climate: {} must be numeric", id, key));
                }
            }
        }

        if let Some(modes) = climate.get("modes") {
            if !modes.is_sequence() {
                self.report
                    .error(format!("DID {} in climate: modes must be a list", id));
            }
        }

        match climate.get("temperature_did") {
            None => {}
            Some(value) if parse_identifier(value).is_some() => {}
            Some(value) => self.report.error(format!(
                "DID {} in climate: temperature_did {:?} is not an integer",
                id, value
            )),
        }

        self.check_templates(id, climate, Scope::Climate);
    }

    #[cfg(feature = "template-check")]
    fn check_templates(&mut self, id: u32, fields: &Mapping, scope: Scope<'_>) {
        for key in TEMPLATE_KEYS {
            let Some(template) = fields.get(*key) else {
                continue;
            };
            let Some(template) = template.as_str() else {
                self.report
                    .error(format!("DID {} {}{}: must be a string", id, key, scope));
                continue;
            };
            if let Err(e) = self.engine.check_syntax(template) {
                self.report.error(format!(
                    "DID {} {}{}: template syntax error: {}",
                    id, key, scope, e
                ));
            }
        }
    }

    #[cfg(not(feature = "template-check"))]
    fn check_templates(&mut self, _id: u32, _fields: &Mapping, _scope: Scope<'_>) {}

    #[cfg(feature = "template-check")]
    fn check_translation_templates(&mut self) {
        let config = self.config;
        let translations = config.translations();
        let mut templates: Vec<(u32, &str)> = translations.value_templates().collect();
        templates.sort_by_key(|(id, _)| *id);

        for (id, template) in templates {
            if let Err(e) = self.engine.check_syntax(template) {
                self.report.error(format!(
                    "DID {} value_template in '{}' translations: template syntax error: {}",
                    id,
                    translations.language(),
                    e
                ));
            }
        }
    }

    #[cfg(not(feature = "template-check"))]
    fn check_translation_templates(&mut self) {}

    /// Render the command template across the forbidden range: values
    /// strictly inside must be rejected, both bounds must be accepted.
    #[cfg(feature = "template-check")]
    fn check_forbidden_range(&mut self, id: u32, datapoint: &Mapping) {
        if !datapoint.contains_key("forbidden_range") {
            return;
        }
        let config = self.config;
        let bounds = config
            .datapoint(id)
            .and_then(|datapoint| datapoint.forbidden_range());
        let Some((min, max)) = bounds.filter(|(min, max)| min < max) else {
            self.report.error(format!(
                "DID {}: forbidden_range needs numeric min < max",
                id
            ));
            return;
        };
        if ![min, max]
            .iter()
            .all(|bound| bound.is_finite() && bound.abs() <= MAX_RANGE_BOUND)
        {
            self.report.error(format!(
                "DID {}: forbidden_range bounds must lie within ±{}",
                id, MAX_RANGE_BOUND as i64
            ));
            return;
        }

        let template = datapoint
            .get("command_template")
            .or_else(|| {
                datapoint
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(|name| config.type_template(name))
                    .and_then(|template| template.get("command_template"))
            })
            .and_then(Value::as_str);
        let Some(template) = template else {
            self.report.error(format!(
                "DID {}: forbidden_range requires a command_template",
                id
            ));
            return;
        };

        let first = min.floor() as i64 + 1;
        let last = max.ceil() as i64 - 1;
        let stride = ((last - first) / MAX_RANGE_SAMPLES).max(1);
        let inside = (first..=last)
            .step_by(stride as usize)
            .filter(|v| (*v as f64) > min && (*v as f64) < max)
            .map(serde_json::Value::from);

        for value in inside {
            match self.engine.render_command(template, &value) {
                Ok(CommandRender::Rejected) => {}
                Ok(CommandRender::Envelope(_)) => self.report.error(format!(
                    "DID {}: command_template accepts forbidden value {}",
                    id, value
                )),
                Err(e) => self.report.error(format!(
                    "DID {}: command_template failed for {}: {}",
                    id, value, e
                )),
            }
        }

        for bound in [min, max] {
            let value = bound_value(bound);
            match self.engine.render_command(template, &value) {
                Ok(CommandRender::Envelope(_)) => {}
                Ok(CommandRender::Rejected) => self.report.error(format!(
                    "DID {}: command_template rejects permitted bound {}",
                    id, value
                )),
                Err(e) => self.report.error(format!(
                    "DID {}: command_template failed for {}: {}",
                    id, value, e
                )),
            }
        }
    }

    #[cfg(not(feature = "template-check"))]
    fn check_forbidden_range(&mut self, _id: u32, _datapoint: &Mapping) {}
}

#[cfg(feature = "template-check")]
fn bound_value(bound: f64) -> serde_json::Value {
    if bound.fract() == 0.0 {
        serde_json::Value::from(bound as i64)
    } else {
        serde_json::Value::from(bound)
    }
}
