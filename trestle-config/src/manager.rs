// Layered key/value configuration

use crate::env::EnvLoader;
use crate::loader::{ConfigLoader, unflatten};
use crate::validation::Validate;
use crate::{ConfigError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Main configuration manager
///
/// Values live under flat dotted keys (`session.secret_key`). Each load
/// overwrites keys already present, so load from the least to the most
/// specific source: files, then `.env`, then the process environment.
///
/// Values read from the environment are strings; the typed getters accept
/// either the native JSON type or its string spelling.
///
/// ```
/// use trestle_config::ConfigManager;
///
/// let config = ConfigManager::new();
/// config.set("session.ttl", "3600").unwrap();
/// assert_eq!(config.get_int("session.ttl").unwrap(), 3600);
/// ```
#[derive(Clone, Default)]
pub struct ConfigManager {
    values: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only read environment variables named `{prefix}_...`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    fn env_loader(&self) -> EnvLoader {
        EnvLoader::new(self.env_prefix.clone())
    }

    fn insert_strings(&self, vars: HashMap<String, String>) -> usize {
        let count = vars.len();
        let mut values = self.values.write();
        for (key, value) in vars {
            values.insert(key, Value::String(value));
        }
        count
    }

    /// Load matching variables from the process environment.
    pub fn load_env(&self) -> Result<()> {
        let count = self.insert_strings(self.env_loader().load());
        debug!(count, "Loaded configuration from environment");
        Ok(())
    }

    /// Load variables from a `.env` file without touching the process
    /// environment.
    ///
    /// With no path, `.env` is searched for from the working directory
    /// upwards and a missing file is not an error.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        let iter = match path {
            Some(path) => dotenvy::from_path_iter(path)
                .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => iter,
                Err(e) if e.not_found() => return Ok(()),
                Err(e) => return Err(ConfigError::LoadError(e.to_string())),
            },
        };
        let pairs = iter
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let count = self.insert_strings(self.env_loader().collect(pairs));
        debug!(count, "Loaded configuration from .env");
        Ok(())
    }

    /// Load a JSON, TOML or env file, detecting the format from its name.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loaded = ConfigLoader::auto(path)?.load_file(path)?;
        debug!(path = %path.display(), count = loaded.len(), "Loaded configuration file");
        self.values.write().extend(loaded);
        Ok(())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    fn raw(&self, key: &str) -> Result<Value> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        serde_json::from_value(self.raw(key)?).map_err(|_| ConfigError::mismatch(key, "value"))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Strings as-is; numbers and booleans in their JSON spelling.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.raw(key)? {
            Value::String(s) => Ok(s),
            value @ (Value::Number(_) | Value::Bool(_)) => Ok(value.to_string()),
            _ => Err(ConfigError::mismatch(key, "string")),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ConfigError::mismatch(key, "integer"))
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ConfigError::mismatch(key, "number"))
    }

    /// Accepts `true/false`, `1/0`, `yes/no` and `on/off` when stored as text.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.raw(key)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
        .ok_or_else(|| ConfigError::mismatch(key, "boolean"))
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Copy every value from `other`, overwriting on conflict.
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.values, &other.values) {
            return;
        }
        let theirs = other.values.read().clone();
        self.values.write().extend(theirs);
    }

    /// The keys under `prefix` as a nested object.
    pub fn section(&self, prefix: &str) -> Value {
        let dotted = format!("{}.", prefix);
        let values = self.values.read();
        unflatten(
            values
                .iter()
                .filter_map(|(k, v)| Some((k.strip_prefix(&dotted)?, v))),
        )
    }

    /// Deserialize the whole tree into `T` and validate it.
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let tree = {
            let values = self.values.read();
            unflatten(values.iter().map(|(k, v)| (k.as_str(), v)))
        };
        let settings: T = serde_json::from_value(tree)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl fmt::Debug for ConfigManager {
    // Values may hold secrets; list keys only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.keys())
            .field("env_prefix", &self.env_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("site.title", "My Blog").unwrap();

        let value: String = manager.get("site.title").unwrap();
        assert_eq!(value, "My Blog");
        assert!(matches!(
            manager.get::<String>("site.missing"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert_eq!(manager.get_or("site.missing", 5u32), 5);
    }

    #[test]
    fn test_string_coercion() {
        let manager = ConfigManager::new();
        manager.set("port", "8080").unwrap();
        manager.set("debug", "on").unwrap();
        manager.set("ratio", " 0.5 ").unwrap();
        manager.set("count", 3).unwrap();
        manager.set("name", "x").unwrap();

        assert_eq!(manager.get_int("port").unwrap(), 8080);
        assert!(manager.get_bool("debug").unwrap());
        assert_eq!(manager.get_float("ratio").unwrap(), 0.5);
        assert_eq!(manager.get_string("count").unwrap(), "3");
        assert!(matches!(
            manager.get_int("name"),
            Err(ConfigError::TypeMismatch { expected: "integer", .. })
        ));
        assert!(manager.get_bool("name").is_err());
    }

    #[test]
    fn test_merge_overwrites() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();
        let other = ConfigManager::new();
        other.set("b", 2).unwrap();

        base.merge(&other);
        base.merge(&base.clone());
        assert_eq!(base.get_int("b").unwrap(), 2);
        assert_eq!(base.keys(), ["a", "b"]);
    }

    #[test]
    fn test_section() {
        let manager = ConfigManager::new();
        manager.set("session.ttl", 60).unwrap();
        manager.set("session.cookie.name", "sid").unwrap();
        manager.set("sessions", true).unwrap();

        assert_eq!(
            manager.section("session"),
            serde_json::json!({"ttl": 60, "cookie": {"name": "sid"}})
        );
    }

    #[derive(Debug, Deserialize)]
    struct Limits {
        uploads: Uploads,
    }

    #[derive(Debug, Deserialize)]
    struct Uploads {
        max_files: u32,
    }

    impl Validate for Limits {
        fn validate(&self) -> Result<()> {
            crate::ConfigValidator::in_range(self.uploads.max_files, 1, 100, "uploads.max_files")
        }
    }

    #[test]
    fn test_load_validated() {
        let manager = ConfigManager::new();
        manager.set("uploads.max_files", 10).unwrap();
        let limits: Limits = manager.load_validated().unwrap();
        assert_eq!(limits.uploads.max_files, 10);

        manager.set("uploads.max_files", 0).unwrap();
        assert!(matches!(
            manager.load_validated::<Limits>(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_debug_hides_values() {
        let manager = ConfigManager::with_prefix("APP");
        manager.set("session.secret_key", "hunter2-hunter2-hunter2").unwrap();
        let debug = format!("{:?}", manager);
        assert!(debug.contains("session.secret_key"));
        assert!(!debug.contains("hunter2"));
    }
}
