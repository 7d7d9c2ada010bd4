//! Error types for local cryptographic operations.

use thiserror::Error;

/// Errors from key generation and key-material encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    /// Deriving the symmetric key from secret and salt failed
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    /// PEM encoding or decoding failed
    #[error("Encoding failed: {0}")]
    Encoding(String),
    /// Encryption operation failed
    #[error("Encryption failed: {0}")]
    Encryption(String),
    /// Decryption operation failed (wrong secret or corrupted ciphertext)
    #[error("Decryption failed: {0}")]
    Decryption(String),
}

impl CryptoError {
    /// Create a key generation error.
    #[must_use]
    pub fn key_generation(msg: impl Into<String>) -> Self {
        Self::KeyGeneration(msg.into())
    }

    /// Create a key derivation error.
    #[must_use]
    pub fn key_derivation(msg: impl Into<String>) -> Self {
        Self::KeyDerivation(msg.into())
    }

    /// Create an encoding error.
    #[must_use]
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create an encryption error.
    #[must_use]
    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }

    /// Create a decryption error.
    #[must_use]
    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::Decryption(msg.into())
    }
}
