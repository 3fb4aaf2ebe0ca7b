//! Password hashing and verification
//!
//! Uses bcrypt; the work factor comes from `BCRYPT_COST`.

use crate::error::AppError;
use bcrypt::{hash, verify};

/// Hash a password using bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash.
///
/// A hash that cannot be parsed counts as a mismatch so that login never
/// reveals more than "invalid credentials".
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify(password, password_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COST: u32 = 4;

    #[test]
    fn test_hash_then_verify() {
        let hashed = hash_password("password123", COST).unwrap();
        assert_ne!(hashed, "password123");
        assert!(verify_password("password123", &hashed));
        assert!(!verify_password("wrongpassword", &hashed));
    }

    #[test]
    fn test_corrupt_hash_is_mismatch() {
        assert!(!verify_password("password123", "not-a-bcrypt-hash"));
    }
}
