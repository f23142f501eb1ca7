// Error types for configuration management

use thiserror::Error;
use trestle_core::RouteBuildError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Configuration key {key} is not a valid {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl ConfigError {
    pub(crate) fn mismatch(key: &str, expected: &'static str) -> Self {
        ConfigError::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    }
}

impl From<ConfigError> for RouteBuildError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ParseError(_) | ConfigError::ValidationError(_) => {
                RouteBuildError::Invalid(err.to_string())
            }
            _ => RouteBuildError::Load(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
