// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Maps environment variables onto configuration keys.
///
/// Names are lowercased and a double underscore separates sections, so with
/// the prefix `TRESTLE` the variable `TRESTLE_SESSION__SECRET_KEY` becomes
/// the key `session.secret_key`.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.map(|p| p.trim_end_matches('_').to_ascii_uppercase()),
        }
    }

    /// The configuration key for variable `name`, or `None` when it lies
    /// outside the prefix.
    pub fn key_for(&self, name: &str) -> Option<String> {
        let rest = match &self.prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => name,
        };
        if rest.is_empty() {
            return None;
        }
        Some(rest.to_ascii_lowercase().replace("__", "."))
    }

    /// The variable name that carries configuration key `key`.
    pub fn var_name(&self, key: &str) -> String {
        let name = key.replace('.', "__").to_ascii_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }

    /// Load every matching variable from the process environment.
    pub fn load(&self) -> HashMap<String, String> {
        self.collect(env::vars())
    }

    /// Map `vars` to configuration keys, dropping those outside the prefix.
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| Some((self.key_for(&name)?, value)))
            .collect()
    }

    /// Read the variable for configuration key `key`.
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}
