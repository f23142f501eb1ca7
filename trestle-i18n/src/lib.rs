//! Locale negotiation for Trestle.
//!
//! [`LocaleFilter`] reads `Accept-Language` and stores the chosen locale on
//! the request context, where handlers and template models pick it up.
//!
//! ```
//! use trestle_i18n::LocaleFilter;
//!
//! let filter = LocaleFilter::new().with_supported(["en", "fr", "de"]).unwrap();
//! assert_eq!(filter.select(Some("fr-CA, en;q=0.7")), "fr");
//! ```

pub mod error;
pub mod filter;
pub mod locale;

pub use error::{I18nError, Result};
pub use filter::LocaleFilter;
pub use locale::{first_language, negotiate_locale, parse_accept_language, Locale};
