//! Entity name resolution

use std::sync::Arc;

use e3_config::{ClimateBlock, Configuration, Datapoint, SubItem};

/// Generic name of a climate entity without a configured name
const CLIMATE_NAME_KEY: &str = "Climate";

/// Resolves the display name of an entity.
///
/// Precedence: user per-sub override, user flat override, then the
/// translated base name joined with the translated sub-item suffix.
pub struct NameResolver {
    config: Arc<Configuration>,
}

impl NameResolver {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }

    pub fn resolve(&self, datapoint: &Datapoint<'_>, sub: Option<&SubItem<'_>>) -> String {
        if let Some(name) = self
            .config
            .user_names()
            .lookup(datapoint.id(), sub.map(|s| s.name()))
        {
            return name.to_string();
        }

        let base = self.base_name(datapoint);
        let Some(sub) = sub else {
            return base;
        };

        let suffix = self.config.translations().suffix(sub.suffix_key());
        if suffix.trim().is_empty() {
            base
        } else {
            format!("{} {}", base, suffix)
        }
    }

    /// Translated base name, `did_<id>` when none is configured
    pub fn base_name(&self, datapoint: &Datapoint<'_>) -> String {
        match datapoint.base_name() {
            Some(name) => self.config.translations().name(name),
            None => format!("did_{}", datapoint.id()),
        }
    }

    pub fn climate_name(&self, block: &ClimateBlock<'_>) -> String {
        if let Some(name) = block.name() {
            return name.to_string();
        }
        let key = block.name_key().unwrap_or(CLIMATE_NAME_KEY);
        self.config.translations().name(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e3_config::ConfigSources;

    const DATAPOINTS: &str = r#"
datapoints:
  268:
    name: Flow Temperature
    type: temperature
    subs:
      Actual: {type: current}
  535:
    name: Electrical Energy Statistics
    type: energy
  999:
    type: temperature
  1415:
    name: Circuit 1 Operation Mode
    type: status
    climate:
      name_key: Heating Circuit 1
  1416:
    type: status
    climate: {}
  1417:
    type: status
    climate: {name: Custom}
"#;

    fn resolver(language: &str, translations: &str, user_names: &str) -> NameResolver {
        let sources = ConfigSources::new(language)
            .with_datapoints(serde_yaml::from_str(DATAPOINTS).unwrap())
            .with_translations(serde_yaml::from_str(translations).unwrap())
            .with_user_names(serde_yaml::from_str(user_names).unwrap());
        NameResolver::new(Arc::new(Configuration::new(sources)))
    }

    fn name(resolver: &NameResolver, id: u32, sub: Option<&str>) -> String {
        let dp = resolver.config.datapoint(id).unwrap();
        let sub = sub.map(|s| dp.sub(s));
        resolver.resolve(&dp, sub.as_ref())
    }

    #[test]
    fn test_computed_names() {
        let r = resolver("en", "{}", "{}");
        assert_eq!(name(&r, 268, None), "Flow Temperature");
        assert_eq!(name(&r, 268, Some("Actual")), "Flow Temperature Current");
        assert_eq!(
            name(&r, 535, Some("GridSuppliedEnergy")),
            "Electrical Energy Statistics GridSuppliedEnergy"
        );
        assert_eq!(name(&r, 999, None), "did_999");
    }

    #[test]
    fn test_translated_names() {
        let r = resolver(
            "de",
            "{names: {Flow Temperature: Vorlauftemperatur}, suffixes: {current: Aktuell}}",
            "{}",
        );
        assert_eq!(name(&r, 268, Some("Actual")), "Vorlauftemperatur Aktuell");
        assert_eq!(name(&r, 535, None), "Electrical Energy Statistics");
    }

    #[test]
    fn test_user_overrides() {
        let r = resolver("de", "{}", "{names: {268: Vorlauf, 535: {Total: Netzbezug}}}");
        assert_eq!(name(&r, 268, Some("Actual")), "Vorlauf");
        assert_eq!(name(&r, 268, None), "Vorlauf");
        assert_eq!(name(&r, 535, Some("Total")), "Netzbezug");
        assert_eq!(
            name(&r, 535, Some("Other")),
            "Electrical Energy Statistics Other"
        );
    }

    #[test]
    fn test_empty_override_ignored() {
        let r = resolver("en", "{}", "{names: {268: ''}}");
        assert_eq!(name(&r, 268, None), "Flow Temperature");
    }

    #[test]
    fn test_climate_names() {
        let r = resolver("de", "{names: {Heating Circuit 1: Heizkreis 1, Climate: Klima}}", "{}");
        let block = |id| r.config.datapoint(id).unwrap().climate().unwrap();
        assert_eq!(r.climate_name(&block(1415)), "Heizkreis 1");
        assert_eq!(r.climate_name(&block(1416)), "Klima");
        assert_eq!(r.climate_name(&block(1417)), "Custom");
    }
}
