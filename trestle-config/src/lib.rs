//! Configuration for Trestle sites
//!
//! A [`ConfigManager`] layers values from files, `.env` and the process
//! environment under flat dotted keys. [`AppSettings`] reads the settings a
//! site needs from it, and [`RouteManifest`] declares routes in TOML.
//!
//! ```no_run
//! use trestle_config::{AppSettings, ConfigManager};
//!
//! # fn main() -> trestle_config::Result<()> {
//! let config = ConfigManager::with_prefix("TRESTLE");
//! config.load_file("trestle.toml")?;
//! config.load_dotenv(None)?;
//! config.load_env()?;
//!
//! let settings = AppSettings::from_manager(&config)?;
//! println!("listening on {}", settings.bind_address);
//! # Ok(())
//! # }
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use manager::ConfigManager;
pub use manifest::{HandlerRegistry, ManifestRouteSource, RouteEntry, RouteManifest};
pub use settings::{AppSettings, SessionSettings};
pub use validation::{ConfigValidator, Validate};
