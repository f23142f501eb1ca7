//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::time::Duration;

/// Name of the session cookie unless configured otherwise.
pub const DEFAULT_COOKIE_NAME: &str = "_auth_session_cookie_";

/// Shortest accepted server key, in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 16;

/// Session cookie configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// Cookie carrying the token
    pub cookie_name: String,
    /// Server key mixed into every digest
    pub secret_key: String,
    /// Lifetime of a normal sign-in
    pub default_ttl: Duration,
    /// Lifetime when the user asked to be remembered
    pub remember_ttl: Duration,
    pub secure: bool,
    pub http_only: bool,
    pub path: String,
    pub domain: Option<String>,
    /// Accept `Authorization: Basic` credentials when no cookie authenticates
    pub basic_auth: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secret_key: String::new(),
            default_ttl: Duration::from_secs(86400),        // 1 day
            remember_ttl: Duration::from_secs(86400 * 365), // 1 year
            secure: false,
            http_only: true,
            path: "/".to_string(),
            domain: None,
            basic_auth: true,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("secret_key", &"******")
            .field("default_ttl", &self.default_ttl)
            .field("remember_ttl", &self.remember_ttl)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("basic_auth", &self.basic_auth)
            .finish()
    }
}

impl SessionConfig {
    /// Configuration with the given server key and default everything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use trestle_session::SessionConfig;
    ///
    /// let config = SessionConfig::new("a-long-random-server-key").with_secure(true);
    /// assert!(config.validate().is_ok());
    /// assert_eq!(config.cookie_name, "_auth_session_cookie_");
    /// ```
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Default::default()
        }
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_remember_ttl(mut self, ttl: Duration) -> Self {
        self.remember_ttl = ttl;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_basic_auth(mut self, enabled: bool) -> Self {
        self.basic_auth = enabled;
        self
    }

    /// Lifetime for a new session.
    pub fn ttl(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.default_ttl
        }
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.secret_key.len() < MIN_SECRET_KEY_LEN {
            return Err(SessionError::Config(format!(
                "secret key must be at least {} bytes",
                MIN_SECRET_KEY_LEN
            )));
        }
        if self.cookie_name.is_empty() {
            return Err(SessionError::Config("cookie name is empty".to_string()));
        }
        if self.default_ttl.is_zero() || self.remember_ttl.is_zero() {
            return Err(SessionError::Config(
                "session lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
