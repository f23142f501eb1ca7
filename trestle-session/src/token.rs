//! Signed session tokens.
//!
//! A token is the base64url (unpadded) encoding of
//! `provider:subject_id:expires:digest`. The digest is an HMAC-SHA256 keyed
//! by the server key over the first three fields and the subject's current
//! secret, so rotating that secret invalidates every outstanding token.

use crate::error::{SessionError, SessionResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const FIELD_SEPARATOR: char = ':';

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Decoded session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub provider: String,
    pub subject_id: String,
    /// Unix timestamp after which the token is refused
    pub expires: i64,
    /// Lowercase hex HMAC digest
    pub digest: String,
}

impl SessionToken {
    /// Encode for the cookie value.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!(
            "{}:{}:{}:{}",
            self.provider, self.subject_id, self.expires, self.digest
        ))
    }

    /// Decode a cookie value. The signature is not checked here.
    pub fn decode(encoded: &str) -> SessionResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        let raw = String::from_utf8(raw).map_err(|e| SessionError::InvalidToken(e.to_string()))?;

        let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        let [provider, subject_id, expires, digest] = fields.as_slice() else {
            return Err(SessionError::InvalidToken(format!(
                "expected 4 fields, found {}",
                fields.len()
            )));
        };

        if provider.is_empty() || subject_id.is_empty() {
            return Err(SessionError::InvalidToken("empty subject".to_string()));
        }
        if expires.is_empty() || !expires.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::InvalidToken("malformed expiry".to_string()));
        }
        let expires = expires
            .parse::<i64>()
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        if digest.len() != DIGEST_HEX_LEN
            || !digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(SessionError::InvalidToken("malformed digest".to_string()));
        }

        Ok(Self {
            provider: provider.to_string(),
            subject_id: subject_id.to_string(),
            expires,
            digest: digest.to_string(),
        })
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires, 0)
    }
}

/// Computes and checks token digests with the server key.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(server_key: &[u8]) -> SessionResult<Self> {
        let mac = HmacSha256::new_from_slice(server_key)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Self { mac })
    }

    fn keyed(&self, provider: &str, subject_id: &str, expires: i64, secret: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(format!("{}:{}:{}:", provider, subject_id, expires).as_bytes());
        mac.update(secret.as_bytes());
        mac
    }

    /// Hex digest over the token fields and the subject's secret.
    pub fn digest(&self, provider: &str, subject_id: &str, expires: i64, secret: &str) -> String {
        hex::encode(
            self.keyed(provider, subject_id, expires, secret)
                .finalize()
                .into_bytes(),
        )
    }

    /// Build a signed token.
    ///
    /// Provider and subject ids may not contain `:`.
    ///
    /// ```
    /// use trestle_session::{SessionToken, TokenSigner};
    ///
    /// let signer = TokenSigner::new(b"server-key").unwrap();
    /// let token = signer.sign("local", "42", 4_102_444_800, "pw-hash").unwrap();
    /// let decoded = SessionToken::decode(&token.encode()).unwrap();
    /// assert!(signer.verify(&decoded, "pw-hash").is_ok());
    /// assert!(signer.verify(&decoded, "rotated").is_err());
    /// ```
    pub fn sign(
        &self,
        provider: &str,
        subject_id: &str,
        expires: i64,
        secret: &str,
    ) -> SessionResult<SessionToken> {
        for field in [provider, subject_id] {
            if field.is_empty() || field.contains(FIELD_SEPARATOR) {
                return Err(SessionError::InvalidToken(format!(
                    "cannot sign field {:?}",
                    field
                )));
            }
        }
        if expires < 0 {
            return Err(SessionError::InvalidToken("negative expiry".to_string()));
        }

        Ok(SessionToken {
            provider: provider.to_string(),
            subject_id: subject_id.to_string(),
            expires,
            digest: self.digest(provider, subject_id, expires, secret),
        })
    }

    /// Constant-time check of `token.digest` against `secret`.
    pub fn verify(&self, token: &SessionToken, secret: &str) -> SessionResult<()> {
        let expected =
            hex::decode(&token.digest).map_err(|_| SessionError::SignatureMismatch)?;
        self.keyed(&token.provider, &token.subject_id, token.expires, secret)
            .verify_slice(&expected)
            .map_err(|_| SessionError::SignatureMismatch)
    }
}
