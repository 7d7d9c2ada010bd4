//! Error types for the identity core.
//!
//! Every failure path surfaces a typed [`IdentityError`]; the transport
//! collaborator maps the variant (or its [`IdentityError::code`]) onto its
//! own response format.

use crate::crypto::CryptoError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors returned by the identity core.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Unknown id or email.
    #[error("{0}")]
    NotFound(String),

    /// One or more validation rules were violated. The message carries every
    /// violated rule, sorted and joined with `". "`.
    #[error("{0}")]
    ConstraintViolation(String),

    /// Key generation, encryption or decryption failed.
    #[error("Crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    /// JWT encoding or decoding failed.
    #[error("Token error: {0}")]
    Token(String),

    /// Storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a constraint violation error from a single rule.
    #[must_use]
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    /// Create a token error.
    #[must_use]
    pub fn token(msg: impl Into<String>) -> Self {
        Self::Token(msg.into())
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code for transport mapping.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => IDENTITY_NOT_FOUND,
            Self::ConstraintViolation(_) => IDENTITY_CONSTRAINT_VIOLATION,
            Self::Crypto(_) => IDENTITY_CRYPTO_FAILURE,
            Self::Token(_) => IDENTITY_TOKEN_ERROR,
            Self::Storage(_) => IDENTITY_STORAGE_ERROR,
            Self::Config(_) => IDENTITY_CONFIG_ERROR,
            Self::Internal(_) => IDENTITY_INTERNAL_ERROR,
        }
    }

    /// Whether the error aborts the in-flight operation as a server fault
    /// rather than a caller mistake.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::ConstraintViolation(_))
    }
}

impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Token(err.to_string())
    }
}

// Error codes for transport responses
/// Unknown id or email.
pub const IDENTITY_NOT_FOUND: &str = "IDENTITY_NOT_FOUND";
/// Validation failure.
pub const IDENTITY_CONSTRAINT_VIOLATION: &str = "IDENTITY_CONSTRAINT_VIOLATION";
/// Crypto failure.
pub const IDENTITY_CRYPTO_FAILURE: &str = "IDENTITY_CRYPTO_FAILURE";
/// JWT failure.
pub const IDENTITY_TOKEN_ERROR: &str = "IDENTITY_TOKEN_ERROR";
/// Storage failure.
pub const IDENTITY_STORAGE_ERROR: &str = "IDENTITY_STORAGE_ERROR";
/// Configuration failure.
pub const IDENTITY_CONFIG_ERROR: &str = "IDENTITY_CONFIG_ERROR";
/// Internal failure.
pub const IDENTITY_INTERNAL_ERROR: &str = "IDENTITY_INTERNAL_ERROR";
