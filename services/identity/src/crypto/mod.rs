//! Local cryptography for signing keys.
//!
//! Provides RSA key generation and the symmetric cipher that protects key
//! material at rest.

pub mod cipher;
pub mod error;
pub mod rsa_keys;

// Re-exports
pub use cipher::TextEncryptor;
pub use error::CryptoError;
pub use rsa_keys::{RsaKeyMaterial, RSA_KEY_BITS};
