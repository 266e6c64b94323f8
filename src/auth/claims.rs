/// Access token claims
///
/// Payload of the signed access token (RFC 7519 registered claims only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID, so two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Create claims valid for `ttl_seconds` starting at `issued_at`
    pub fn new(subject: Uuid, issuer: &str, issued_at: DateTime<Utc>, ttl_seconds: i64) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            iat,
            exp: iat + ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the subject identity
    ///
    /// # Errors
    /// Returns `Malformed` if `sub` is not a UUID
    pub fn subject(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| TokenError::Malformed("subject is not a valid UUID".to_string()))
    }

    /// Validity is `[iat, exp)`: a token whose `exp` equals `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
