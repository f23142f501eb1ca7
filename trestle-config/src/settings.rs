//! Typed application settings
//!
//! | key                    | default                 |
//! |------------------------|-------------------------|
//! | `debug`                | `false`                 |
//! | `bind_address`         | `127.0.0.1:8080`        |
//! | `document_root`        | unset                   |
//! | `route_manifest`       | unset                   |
//! | `session.cookie_name`  | `_auth_session_cookie_` |
//! | `session.secret_key`   | required                |
//! | `session.ttl`          | `86400` seconds         |
//! | `session.remember_ttl` | one year, in seconds    |
//! | `session.secure`       | `false`                 |
//! | `session.basic_auth`   | `true`                  |

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigManager, Result};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_COOKIE: &str = "_auth_session_cookie_";
pub const DEFAULT_SESSION_TTL: u64 = 24 * 60 * 60;
pub const DEFAULT_REMEMBER_TTL: u64 = 365 * DEFAULT_SESSION_TTL;
/// Shortest accepted signing key, in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 16;

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn seconds(config: &ConfigManager, key: &str, default: u64) -> Result<u64> {
    match optional(config.get_int(key))? {
        Some(secs) => u64::try_from(secs).map_err(|_| ConfigError::mismatch(key, "duration")),
        None => Ok(default),
    }
}

/// Session cookie settings
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub secret_key: String,
    pub ttl: Duration,
    pub remember_ttl: Duration,
    pub secure: bool,
    pub basic_auth: bool,
}

impl SessionSettings {
    pub fn from_manager(config: &ConfigManager) -> Result<Self> {
        Ok(Self {
            cookie_name: optional(config.get_string("session.cookie_name"))?
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            secret_key: optional(config.get_string("session.secret_key"))?.unwrap_or_default(),
            ttl: Duration::from_secs(seconds(config, "session.ttl", DEFAULT_SESSION_TTL)?),
            remember_ttl: Duration::from_secs(seconds(
                config,
                "session.remember_ttl",
                DEFAULT_REMEMBER_TTL,
            )?),
            secure: optional(config.get_bool("session.secure"))?.unwrap_or(false),
            basic_auth: optional(config.get_bool("session.basic_auth"))?.unwrap_or(true),
        })
    }
}

impl Validate for SessionSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_cookie_name(&self.cookie_name, "session.cookie_name")?;
        ConfigValidator::not_empty(&self.secret_key, "session.secret_key")?;
        ConfigValidator::min_len(&self.secret_key, MIN_SECRET_KEY_LEN, "session.secret_key")?;
        ConfigValidator::in_range(self.ttl.as_secs(), 1, u64::from(u32::MAX), "session.ttl")?;
        ConfigValidator::in_range(
            self.remember_ttl.as_secs(),
            self.ttl.as_secs(),
            u64::from(u32::MAX),
            "session.remember_ttl",
        )
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("cookie_name", &self.cookie_name)
            .field("secret_key", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("remember_ttl", &self.remember_ttl)
            .field("secure", &self.secure)
            .field("basic_auth", &self.basic_auth)
            .finish()
    }
}

/// Everything a site needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// Rebuild routes when the manifest changes and include error details
    /// in responses.
    pub debug: bool,
    pub bind_address: SocketAddr,
    /// Directory served under `/static/` and `/favicon.ico`.
    pub document_root: Option<PathBuf>,
    /// TOML route manifest, see [`RouteManifest`](crate::RouteManifest).
    pub route_manifest: Option<PathBuf>,
    pub session: SessionSettings,
}

impl AppSettings {
    /// Read and validate settings from `config`.
    pub fn from_manager(config: &ConfigManager) -> Result<Self> {
        let bind = optional(config.get_string("bind_address"))?
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let settings = Self {
            debug: optional(config.get_bool("debug"))?.unwrap_or(false),
            bind_address: ConfigValidator::is_socket_addr(&bind, "bind_address")?,
            document_root: optional(config.get_string("document_root"))?.map(PathBuf::from),
            route_manifest: optional(config.get_string("route_manifest"))?.map(PathBuf::from),
            session: SessionSettings::from_manager(config)?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for AppSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_port(self.bind_address.port(), "bind_address")?;
        if let Some(root) = &self.document_root {
            ConfigValidator::not_empty(&root.to_string_lossy(), "document_root")?;
        }
        self.session.validate()
    }
}
