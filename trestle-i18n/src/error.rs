//! Error types for locale handling

use thiserror::Error;

/// Result type for i18n operations.
pub type Result<T> = std::result::Result<T, I18nError>;

/// Errors that can occur during i18n operations.
#[derive(Debug, Error)]
pub enum I18nError {
    /// Not a usable language tag
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    /// A locale filter was configured with an empty supported list
    #[error("No supported locales configured")]
    NoSupportedLocales,
}
