use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ResearchError;

/// Environment variable that overrides `search.api_key`.
pub const SEARCH_API_KEY_ENV: &str = "SERP_API_KEY";

const REDACT_PLACEHOLDER: &str = "****";

/// Key fragments that mark a value as secret.
const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "credential",
    "bearer",
    "authorization",
    "_token",
    "token_",
];

/// Token-count settings that merely look like secrets.
const NOT_SENSITIVE: [&str; 3] = ["max_new_tokens", "max_tokens", "tokenizer_path"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    /// `RESEARCH_CONFIG_PATH`, else the user copy, else the shipped one.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = env::var_os("RESEARCH_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            user_config
        } else {
            self.paths.project_root.join("config.yml")
        }
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Merged `config.yml` + `secrets.yaml` + environment overrides, validated.
    pub fn load_config(&self) -> Result<Value, ResearchError> {
        let mut config = load_yaml_file(&self.config_path())?;
        merge_into(&mut config, load_yaml_file(&self.secrets_path())?);
        apply_env_overrides(&mut config, env::var(SEARCH_API_KEY_ENV).ok());
        validate_config(&config)?;
        Ok(config)
    }

    pub fn load_settings(&self) -> Result<Settings, ResearchError> {
        let config = self.load_config()?;
        tracing::debug!("Loaded configuration: {}", redact_sensitive_values(&config));
        Settings::from_value(&config)
    }
}

fn apply_env_overrides(config: &mut Value, search_api_key: Option<String>) {
    let Some(key) = search_api_key.filter(|k| !k.trim().is_empty()) else {
        return;
    };
    merge_into(config, json!({ "search": { "api_key": key } }));
}

/// Missing files read as an empty document; unreadable or non-mapping
/// documents are configuration errors.
fn load_yaml_file(path: &Path) -> Result<Value, ResearchError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ResearchError::BadRequest(format!("{}: {}", path.display(), e)))?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value = serde_yaml::from_str(&contents)
        .map_err(|e| ResearchError::BadRequest(format!("{}: {}", path.display(), e)))?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ResearchError::BadRequest(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

/// Recursively merge `overlay` into `base`; mappings merge key by key,
/// anything else is replaced.
fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

pub fn redact_sensitive_values(value: &Value) -> Value {
    let mut redacted = value.clone();
    redact_in_place(&mut redacted);
    redacted
}

fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_sensitive_key(key) && !val.is_null() {
                    *val = Value::String(REDACT_PLACEHOLDER.to_string());
                } else {
                    redact_in_place(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_in_place),
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    !NOT_SENSITIVE.contains(&key.as_str())
        && SENSITIVE_PATTERNS.iter().any(|pattern| key.contains(pattern))
}
