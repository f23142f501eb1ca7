// Trestle - a multi-tenant CMS web core for Rust
//
// Route patterns, a dispatcher with a per-request context and filters, and
// signed session cookies. Optional crates add tenancy, locales and
// configuration.

// Re-export core functionality
pub use trestle_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trestle_config;

#[cfg(feature = "session")]
pub use trestle_session;

#[cfg(feature = "tenancy")]
pub use trestle_tenancy;

#[cfg(feature = "i18n")]
pub use trestle_i18n;

#[cfg(feature = "testing")]
pub use trestle_testing;

/// Session configuration from loaded application settings.
#[cfg(all(feature = "config", feature = "session"))]
pub fn session_config(settings: &trestle_config::SessionSettings) -> trestle_session::SessionConfig {
    trestle_session::SessionConfig::new(settings.secret_key.clone())
        .with_cookie_name(settings.cookie_name.clone())
        .with_default_ttl(settings.ttl)
        .with_remember_ttl(settings.remember_ttl)
        .with_secure(settings.secure)
        .with_basic_auth(settings.basic_auth)
}

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Application, CookieOptions, Dispatcher, Error, Filter, Handler, HandlerResult, HttpMethod,
        MethodMask, Request, RequestContext, Response, Role, RouteTable, handler_fn,
    };

    #[cfg(feature = "session")]
    pub use trestle_session::{SessionAuthenticator, SessionConfig, SessionFilter};

    #[cfg(feature = "tenancy")]
    pub use trestle_tenancy::{HostTenantResolver, TenantFilter};

    #[cfg(feature = "i18n")]
    pub use trestle_i18n::LocaleFilter;

    #[cfg(feature = "config")]
    pub use trestle_config::{AppSettings, ConfigManager};
}

#[cfg(all(test, feature = "config", feature = "session"))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_config_from_settings() {
        let config = trestle_config::ConfigManager::new();
        config.set("session.secret_key", "a-long-enough-secret-key").unwrap();
        config.set("session.cookie_name", "sid").unwrap();
        config.set("session.remember_ttl", 604_800).unwrap();

        let settings = trestle_config::AppSettings::from_manager(&config).unwrap();
        let session = session_config(&settings.session);
        assert_eq!(session.cookie_name, "sid");
        assert_eq!(session.ttl(true), Duration::from_secs(604_800));
        assert_eq!(session.ttl(false), Duration::from_secs(86_400));
        assert!(session.validate().is_ok());
    }
}
