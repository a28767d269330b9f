//! YAML loader with custom tag support
//!
//! Datapoint files may be split up with:
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_named dir` - Merge mappings from all YAML files in a directory
//! - `!env_var VAR` - Environment variable substitution
//!
//! [`load_sources`] reads the fixed layout under a config directory:
//!
//! ```text
//! <config_dir>/datapoints.yaml
//! <config_dir>/templates/types.yaml
//! <config_dir>/translations/<lang>.yaml   (not read for en)
//! <config_dir>/user/names.yaml            (optional)
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::model::ConfigSources;
use e3_core::DEFAULT_LANGUAGE;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

pub const DATAPOINTS_FILE: &str = "datapoints.yaml";
pub const TYPES_FILE: &str = "templates/types.yaml";
pub const TRANSLATIONS_DIR: &str = "translations";
pub const USER_NAMES_FILE: &str = "user/names.yaml";

/// YAML loader resolving includes relative to the including file
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Track included files to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Create a new YAML loader for the given config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load a file if it exists, `Null` otherwise
    pub fn load_optional(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let resolved = self.resolve_path(path.as_ref());
        if !resolved.is_file() {
            return Ok(Value::Null);
        }
        self.load_file(resolved)
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let processed_key = self.process_value(k, source_path)?;
                    let processed_value = self.process_value(v, source_path)?;
                    result.insert(processed_key, processed_value);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> = seq
                    .into_iter()
                    .map(|v| self.process_value(v, source_path))
                    .collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        let value = tagged.value;

        trace!("Processing tag '{}' with value {:?}", tag, value);

        match tag.as_str() {
            "!include" => {
                let include_path = self.value_to_path(&value, source_path)?;
                debug!("Including file: {:?}", include_path);
                self.load_file(&include_path)
            }
            "!include_dir_merge_named" => self.process_include_dir_merge_named(value, source_path),
            "!env_var" => self.process_env_var(value),
            _ => {
                // Unknown tag, keep it as-is but process the inner value
                let processed = self.process_value(value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value: processed,
                })))
            }
        }
    }

    /// Merge mappings from all YAML files in a directory, later files win
    fn process_include_dir_merge_named(
        &mut self,
        value: Value,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let dir_path = self.value_to_path(&value, source_path)?;
        debug!("Including directory as merged mapping: {:?}", dir_path);

        let mut result = serde_yaml::Mapping::new();
        for file in self.get_yaml_files(&dir_path)? {
            if let Value::Mapping(map) = self.load_file(&file)? {
                for (k, v) in map {
                    result.insert(k, v);
                }
            }
        }

        Ok(Value::Mapping(result))
    }

    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let var_name = match value {
            Value::String(s) => s,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "!env_var".to_string(),
                    reason: "environment variable name must be a string".to_string(),
                })
            }
        };

        let env_value = std::env::var(&var_name).map_err(|_| ConfigError::EnvVarNotFound {
            var: var_name.clone(),
        })?;

        debug!("Substituted env var: {}", var_name);
        Ok(Value::String(env_value))
    }

    /// Convert a YAML value to a path, resolving relative to source file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s.clone(),
            _ => {
                return Err(ConfigError::InvalidIncludePath {
                    path: format!("{:?}", value),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        let resolved = if Path::new(&path_str).is_absolute() {
            PathBuf::from(&path_str)
        } else {
            base_dir.join(&path_str)
        };

        Ok(resolved)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Get all YAML files in a directory, sorted by name
    fn get_yaml_files(&self, dir: &Path) -> ConfigResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ConfigError::InvalidIncludePath {
                path: dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();

        files.sort();
        Ok(files)
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Load a YAML file with full tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

/// Read every configuration file for `language` from `config_dir`.
///
/// A missing file is logged and treated as an empty section; a file that
/// exists but cannot be parsed is an error.
pub fn load_sources(config_dir: impl AsRef<Path>, language: &str) -> ConfigResult<ConfigSources> {
    let config_dir = config_dir.as_ref();
    let mut loader = YamlLoader::new(config_dir);

    let datapoints = load_section(&mut loader, DATAPOINTS_FILE)?;
    let types = load_section(&mut loader, TYPES_FILE)?;

    let translations = if language == DEFAULT_LANGUAGE {
        Value::Null
    } else {
        let file = format!("{}/{}.yaml", TRANSLATIONS_DIR, language);
        load_section(&mut loader, &file)?
    };

    let user_names = loader.load_optional(USER_NAMES_FILE)?;
    if !user_names.is_null() {
        info!("Loaded user name overrides from {}", USER_NAMES_FILE);
    }

    Ok(ConfigSources {
        datapoints,
        types,
        translations,
        user_names,
        language: language.to_string(),
    })
}

fn load_section(loader: &mut YamlLoader, file: &str) -> ConfigResult<Value> {
    let value = loader.load_optional(file)?;
    if value.is_null() {
        warn!(
            "{} not found in {}, continuing with an empty section",
            file,
            loader.config_dir().display()
        );
    }
    Ok(value)
}
