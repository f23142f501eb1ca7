// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;
use std::net::SocketAddr;

/// Implemented by typed settings that can check themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

/// Field-level checks. Each takes the field name for the error message.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(invalid(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    pub fn min_len(value: &str, min: usize, field: &str) -> Result<()> {
        if value.len() < min {
            return Err(invalid(format!(
                "{} must be at least {} characters",
                field, min
            )));
        }
        Ok(())
    }

    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(invalid(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    pub fn one_of<T: PartialEq + Display>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            return Err(invalid(format!(
                "{} must be one of the allowed values, got {}",
                field, value
            )));
        }
        Ok(())
    }

    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(invalid(format!("{} must be a valid port number", field)));
        }
        Ok(())
    }

    /// `host:port` with a literal IP address.
    pub fn is_socket_addr(value: &str, field: &str) -> Result<SocketAddr> {
        let addr: SocketAddr = value
            .parse()
            .map_err(|_| invalid(format!("{} must be an address like 127.0.0.1:8080", field)))?;
        Self::is_port(addr.port(), field)?;
        Ok(addr)
    }

    /// A cookie name must be a non-empty RFC 6265 token.
    pub fn is_cookie_name(value: &str, field: &str) -> Result<()> {
        let valid = !value.is_empty()
            && value.bytes().all(|b| {
                b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}')
            });
        if !valid {
            return Err(invalid(format!("{} is not a valid cookie name", field)));
        }
        Ok(())
    }
}
