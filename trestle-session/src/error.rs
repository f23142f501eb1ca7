//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
///
/// Verification failures never reach the client as errors: the session
/// filter logs them and continues with an anonymous request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The cookie is not a well-formed token
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// The token's expiry has passed
    #[error("Session expired")]
    Expired,

    /// The digest does not match the subject's current secret
    #[error("Session signature mismatch")]
    SignatureMismatch,

    /// The token names a subject the identity store does not know
    #[error("Unknown subject: {provider}:{subject_id}")]
    UnknownSubject { provider: String, subject_id: String },

    /// The subject belongs to another tenant
    #[error("Subject {subject_id} belongs to tenant {subject_tenant:?}")]
    TenantMismatch {
        subject_id: String,
        subject_tenant: String,
    },

    /// Identity store failure
    #[error("Identity store error: {0}")]
    Store(String),

    /// Password hashing or verification failure
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// True when the failure suggests a forged or corrupted cookie rather
    /// than plain expiry or absence.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidToken(_) | SessionError::SignatureMismatch
        )
    }
}

impl From<SessionError> for trestle_core::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken(_)
            | SessionError::Expired
            | SessionError::SignatureMismatch
            | SessionError::UnknownSubject { .. }
            | SessionError::TenantMismatch { .. } => trestle_core::Error::Unauthorized(err.to_string()),
            SessionError::Store(_) | SessionError::PasswordHash(_) | SessionError::Config(_) => {
                trestle_core::Error::Internal(err.to_string())
            }
        }
    }
}
