//! Password hashing.

use crate::error::{IdentityError, IdentityResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// One-way password encoding.
pub trait PasswordEncoder: Send + Sync {
    /// Hash a raw password.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Internal`] if hashing fails.
    fn encode(&self, raw: &str) -> IdentityResult<String>;

    /// Check a raw password against a stored hash.
    fn matches(&self, raw: &str, encoded: &str) -> bool;
}

/// Argon2id with default parameters, PHC string output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordEncoder;

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw: &str) -> IdentityResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::internal(format!("Password hashing failed: {e}")))
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        PasswordHash::new(encoded)
            .is_ok_and(|parsed| Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok())
    }
}
