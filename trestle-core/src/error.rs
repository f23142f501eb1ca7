// Error types for the Trestle framework

use crate::{HttpMethod, HttpStatus};
use thiserror::Error;

/// Request-level errors.
///
/// The HTTP-signal variants carry a status (and sometimes headers) and are
/// raised anywhere below the dispatcher as control flow. Everything else is an
/// internal failure that surfaces to the client as a generic 500.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {method} {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<HttpMethod>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Redirect ({status}) to {location}")]
    Redirect { status: HttpStatus, location: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 301 Moved Permanently
    pub fn moved_permanently(location: impl Into<String>) -> Self {
        Error::Redirect {
            status: HttpStatus::MovedPermanently,
            location: location.into(),
        }
    }

    /// 302 Found
    pub fn redirect(location: impl Into<String>) -> Self {
        Error::Redirect {
            status: HttpStatus::Found,
            location: location.into(),
        }
    }

    /// 303 See Other
    pub fn see_other(location: impl Into<String>) -> Self {
        Error::Redirect {
            status: HttpStatus::SeeOther,
            location: location.into(),
        }
    }

    /// Get the HTTP status for this error
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::BadRequest(_) => HttpStatus::BadRequest,
            Error::Unauthorized(_) => HttpStatus::Unauthorized,
            Error::Forbidden(_) => HttpStatus::Forbidden,
            Error::NotFound(_) => HttpStatus::NotFound,
            Error::MethodNotAllowed { .. } => HttpStatus::MethodNotAllowed,
            Error::Conflict(_) => HttpStatus::Conflict,
            Error::Redirect { status, .. } => *status,

            // Default to 500 for everything that is not an HTTP signal
            _ => HttpStatus::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Extra response headers the signal carries.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Error::Redirect { location, .. } => vec![("Location", location.clone())],
            Error::MethodNotAllowed { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(HttpMethod::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![("Allow", allow)]
            }
            _ => Vec::new(),
        }
    }

    /// True for the variants that are deliberate HTTP signals rather than failures.
    pub fn is_signal(&self) -> bool {
        !self.http_status().is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_status_codes() {
        assert_eq!(Error::BadRequest("x".into()).status_code(), 400);
        assert_eq!(Error::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(Error::Forbidden("x".into()).status_code(), 403);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::Conflict("x".into()).status_code(), 409);
        assert_eq!(Error::Internal("x".into()).status_code(), 500);
        assert_eq!(Error::see_other("/").status_code(), 303);
        assert_eq!(Error::moved_permanently("/").status_code(), 301);
        assert_eq!(Error::redirect("/").status_code(), 302);
    }

    #[test]
    fn test_internal_kinds_are_not_signals() {
        let io = Error::Io(std::io::Error::other("disk"));
        assert_eq!(io.status_code(), 500);
        assert!(!io.is_signal());
        assert!(!Error::Template("boom".into()).is_signal());
        assert!(Error::NotFound("x".into()).is_signal());
    }

    #[test]
    fn test_signal_headers() {
        let redirect = Error::see_other("/signin");
        assert_eq!(redirect.headers(), vec![("Location", "/signin".to_string())]);

        let not_allowed = Error::MethodNotAllowed {
            method: "DELETE".into(),
            path: "/article/1".into(),
            allowed: vec![HttpMethod::GET, HttpMethod::POST],
        };
        assert_eq!(not_allowed.status_code(), 405);
        assert_eq!(not_allowed.headers(), vec![("Allow", "GET, POST".to_string())]);
    }
}
