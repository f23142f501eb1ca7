// Configuration file loaders

use crate::env::EnvLoader;
use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines, read with the same rules as `.env` files.
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Detect from the extension, treating a bare `.env` file name as `Env`.
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.file_name().is_some_and(|name| name == ".env") {
            return Some(FileFormat::Env);
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Configuration file loader
///
/// Every format is reduced to a flat map of dotted keys, so
/// `[session] ttl = 60` in TOML and `SESSION__TTL=60` in an env file both
/// land on `session.ttl`.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file name.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::from_path(path).map(Self::new).ok_or_else(|| {
            ConfigError::LoadError(format!("Unsupported configuration file: {}", path.display()))
        })
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<HashMap<String, Value>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<HashMap<String, Value>> {
        match self.format {
            FileFormat::Json => {
                let value: Value = serde_json::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))?;
                flatten(value)
            }
            FileFormat::Toml => {
                let value: Value = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
                flatten(value)
            }
            FileFormat::Env => parse_env(content),
        }
    }
}

fn parse_env(content: &str) -> Result<HashMap<String, Value>> {
    let pairs = dotenvy::from_read_iter(content.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::ParseError(format!("Env parse error: {}", e)))?;

    Ok(EnvLoader::default()
        .collect(pairs)
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect())
}

/// Flatten nested objects into dotted keys. Arrays are kept whole.
pub fn flatten(value: Value) -> Result<HashMap<String, Value>> {
    let Value::Object(map) = value else {
        return Err(ConfigError::ParseError(
            "Configuration root must be a table".to_string(),
        ));
    };
    let mut out = HashMap::new();
    flatten_into("", map, &mut out);
    Ok(out)
}

fn flatten_into(prefix: &str, map: Map<String, Value>, out: &mut HashMap<String, Value>) {
    for (key, value) in map {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(&key, inner, out),
            other => {
                out.insert(key, other);
            }
        }
    }
}

/// Rebuild nested objects from dotted keys.
///
/// When a scalar and a section share a name, the section wins.
pub fn unflatten<'a, I>(entries: I) -> Value
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut root = Map::new();
    for (key, value) in entries {
        let mut node = &mut root;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                if !node.get(part).is_some_and(Value::is_object) {
                    node.insert(part.to_string(), value.clone());
                }
                break;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            match child.as_object_mut() {
                Some(map) => node = map,
                None => break,
            }
        }
    }
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_toml_sections() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let values = loader
            .parse(
                r#"
                debug = true

                [session]
                cookie_name = "sid"
                ttl = 60
            "#,
            )
            .unwrap();

        assert_eq!(values["debug"], json!(true));
        assert_eq!(values["session.cookie_name"], json!("sid"));
        assert_eq!(values["session.ttl"], json!(60));
    }

    #[test]
    fn test_parse_json_keeps_arrays() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let values = loader
            .parse(r#"{"i18n": {"locales": ["en", "fr"]}}"#)
            .unwrap();
        assert_eq!(values["i18n.locales"], json!(["en", "fr"]));
        assert!(loader.parse("[1, 2]").is_err());
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let values = loader
            .parse("# comment\nDEBUG=1\nSESSION__SECRET_KEY=\"quoted value\"\n")
            .unwrap();
        assert_eq!(values["debug"], json!("1"));
        assert_eq!(values["session.secret_key"], json!("quoted value"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_path(Path::new("app.toml")), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_path(Path::new("/srv/.env")), Some(FileFormat::Env));
        assert_eq!(FileFormat::from_path(Path::new("app.yaml")), None);
        assert!(ConfigLoader::auto("settings").is_err());
    }

    #[test]
    fn test_unflatten() {
        let a = json!(1);
        let b = json!("x");
        let shadowed = json!(false);
        let tree = unflatten([
            ("session.ttl", &a),
            ("session.cookie_name", &b),
            ("session", &shadowed),
        ]);
        assert_eq!(tree, json!({"session": {"ttl": 1, "cookie_name": "x"}}));
    }
}
