// Password hashing and verification

use crate::error::{SessionError, SessionResult};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};

/// Argon2 password hasher for local accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a password into PHC string format.
    pub fn hash(&self, password: &str) -> SessionResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SessionError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// A stored value that is not an argon2 PHC string never matches.
    pub fn verify(&self, password: &str, hash: &str) -> SessionResult<bool> {
        if !hash.starts_with("$argon2") {
            return Ok(false);
        }
        let parsed = PasswordHash::new(hash).map_err(|e| SessionError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
