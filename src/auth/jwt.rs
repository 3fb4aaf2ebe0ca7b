//! JWT token management
//!
//! Mints and verifies HS256 tokens carrying a subject id and a role.

use crate::auth::Role;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User role
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp); absent when the issuer has no TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Why a presented token was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token could not be parsed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,
}

/// Signs and verifies tokens with one shared secret.
///
/// Built once at startup from configuration and shared read-only.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: Option<i64>,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`; `exp` is optional.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: ttl.map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        }
    }

    /// Create a token for `subject` issued now
    pub fn mint(&self, subject: &str, role: Role) -> Result<String, AppError> {
        self.mint_at(subject, role, Utc::now())
    }

    /// Create a token for `subject` issued at `issued_at`
    pub fn mint_at(&self, subject: &str, role: Role, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat,
            exp: self.ttl_secs.map(|ttl| iat.saturating_add(ttl)),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Decode and validate a token against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        self.verify_at(token, Utc::now())
    }

    /// Decode and validate a token against `now`.
    ///
    /// The HMAC comparison inside `jsonwebtoken` is constant time. A token is
    /// valid strictly before its `exp` second.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, VerifyError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => VerifyError::BadSignature,
                _ => VerifyError::Malformed,
            })?
            .claims;

        if let Some(exp) = claims.exp {
            if exp <= now.timestamp() {
                return Err(VerifyError::Expired);
            }
        }

        Ok(claims)
    }
}
