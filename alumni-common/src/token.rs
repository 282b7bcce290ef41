//! Signed session tokens
//!
//! Used by the built-in auth provider. Tokens are HS256 JWTs keyed by the
//! shared secret (big-endian bytes of the i64). Expiry is checked against a
//! caller-supplied clock so verification stays deterministic.
//!
//! Pure functions only; HTTP handling lives in the web crate.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Stable user id
    pub sub: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiry as unix seconds
    pub exp: i64,
}

/// Token validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },

    #[error("Shared secret 0 cannot sign tokens")]
    DisabledSecret,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

fn key_bytes(shared_secret: i64) -> [u8; 8] {
    shared_secret.to_be_bytes()
}

/// Issue a token for `claims`
pub fn issue_token(claims: &TokenClaims, shared_secret: i64) -> Result<String, TokenError> {
    if shared_secret == 0 {
        return Err(TokenError::DisabledSecret);
    }

    let key = EncodingKey::from_secret(&key_bytes(shared_secret));
    Ok(encode(&Header::new(Algorithm::HS256), claims, &key)?)
}

/// Verify signature and expiry, returning the claims
///
/// `now` is unix seconds; tokens are valid while `now < exp`.
pub fn verify_token(token: &str, shared_secret: i64, now: i64) -> Result<TokenClaims, TokenError> {
    if shared_secret == 0 {
        return Err(TokenError::DisabledSecret);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    let key = DecodingKey::from_secret(&key_bytes(shared_secret));
    let claims = decode::<TokenClaims>(token.trim(), &key, &validation)?.claims;

    if now >= claims.exp {
        return Err(TokenError::Expired {
            exp: claims.exp,
            now,
        });
    }

    Ok(claims)
}
