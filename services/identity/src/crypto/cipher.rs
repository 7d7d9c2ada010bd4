//! Symmetric encryption of key material at rest.
//!
//! The AES-256 key is derived once from the externally supplied secret and
//! salt with Argon2id and kept only in zeroizing memory. Ciphertexts are
//! base64 text of `nonce || ciphertext || tag`.

use super::error::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use zeroize::Zeroizing;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Minimum salt length accepted by Argon2.
pub const MIN_SALT_LEN: usize = 8;

/// Argon2id memory cost in KiB (19 MiB).
const KDF_MEMORY_KIB: u32 = 19_456;

/// Argon2id iteration count.
const KDF_ITERATIONS: u32 = 2;

/// Argon2id parallelism.
const KDF_PARALLELISM: u32 = 1;

/// Text encryptor keyed by a secret and salt held only in memory.
pub struct TextEncryptor {
    key: Zeroizing<[u8; 32]>,
}

impl TextEncryptor {
    /// Derive the encryption key from `secret` and `salt`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if the secret is empty, the salt
    /// is shorter than [`MIN_SALT_LEN`] bytes, or Argon2 rejects the input.
    pub fn new(secret: &SecretString, salt: &str) -> Result<Self, CryptoError> {
        if secret.expose_secret().is_empty() {
            return Err(CryptoError::key_derivation("secret must not be empty"));
        }
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::key_derivation(format!(
                "salt must be at least {MIN_SALT_LEN} bytes, got {}",
                salt.len()
            )));
        }

        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, KDF_PARALLELISM, Some(32))
            .map_err(|e| CryptoError::key_derivation(format!("invalid Argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(secret.expose_secret().as_bytes(), salt.as_bytes(), &mut *key)
            .map_err(|e| CryptoError::key_derivation(e.to_string()))?;

        Ok(Self { key })
    }

    /// Encrypt `plaintext` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| CryptoError::encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt text produced by [`TextEncryptor::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] on malformed input, a wrong secret
    /// or tampered ciphertext. No partial plaintext is ever returned.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::decryption(format!("invalid base64: {e}")))?;

        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::decryption(format!(
                "ciphertext too short: {} bytes",
                bytes.len()
            )));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| CryptoError::decryption(e.to_string()))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|_| {
                    CryptoError::decryption("authentication failed (wrong secret or corrupted ciphertext)")
                })?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| CryptoError::decryption(format!("plaintext is not UTF-8: {e}")))
    }
}

impl fmt::Debug for TextEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextEncryptor").field("key", &"[REDACTED]").finish()
    }
}
