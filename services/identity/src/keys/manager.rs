//! Signing key lifecycle.
//!
//! Generation, encrypted persistence, lookup, purge and serialized rotation.
//! Rotation from any trigger goes through one lock; a caller that loses the
//! race observes the winner's key instead of generating another one.

use super::model::{SigningKeyPair, SigningKeyView};
use super::store::KeyStore;
use crate::crypto::{RsaKeyMaterial, TextEncryptor};
use crate::error::{IdentityError, IdentityResult};
use crate::metrics;
use crate::time::now_millis;
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

/// What caused a rotation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    /// Service start with possibly empty store
    Startup,
    /// Periodic scheduler tick
    Scheduled,
}

impl RotationTrigger {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Result of a rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// A new key was generated and is now the newest.
    Generated(SigningKeyPair),
    /// Another caller already produced a satisfying key; nothing was
    /// generated.
    AlreadySatisfied {
        /// Id of the current newest key
        kid: String,
    },
}

impl RotationOutcome {
    /// Id of the newest key after the attempt.
    #[must_use]
    pub fn kid(&self) -> &str {
        match self {
            Self::Generated(pair) => &pair.id,
            Self::AlreadySatisfied { kid } => kid,
        }
    }

    /// Whether this attempt generated the key.
    #[must_use]
    pub const fn generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Generated(_) => "generated",
            Self::AlreadySatisfied { .. } => "already_satisfied",
        }
    }
}

/// Owns the signing key store and the cipher protecting it.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    encryptor: Arc<TextEncryptor>,
    rotation_lock: Mutex<()>,
}

impl KeyManager {
    /// Create a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, encryptor: Arc<TextEncryptor>) -> Self {
        Self {
            store,
            encryptor,
            rotation_lock: Mutex::new(()),
        }
    }

    /// Generate fresh key material without persisting it.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Crypto`] if generation fails.
    pub fn generate(&self) -> IdentityResult<RsaKeyMaterial> {
        Ok(RsaKeyMaterial::generate()?)
    }

    /// Encrypt both halves and persist them as a new record.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Crypto`] if encryption fails or
    /// [`IdentityError::Storage`] if the store rejects the record.
    #[instrument(skip(self, material), fields(kid = %material.kid))]
    pub async fn save(&self, material: &RsaKeyMaterial) -> IdentityResult<SigningKeyPair> {
        let now = now_millis();
        let pair = SigningKeyPair {
            id: material.kid.clone(),
            encrypted_public_key: self.encryptor.encrypt(&material.public_pem)?,
            encrypted_private_key: self.encryptor.encrypt(&material.private_pem)?,
            created_at: now,
            updated_at: now,
        };
        let saved = self.store.insert(pair).await?;
        debug!(backend = self.store.backend_name(), "Signing key persisted");
        Ok(saved)
    }

    /// Newest record.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] if the store is empty.
    pub async fn find_newest(&self) -> IdentityResult<SigningKeyPair> {
        self.store
            .find_newest()
            .await?
            .ok_or_else(|| IdentityError::not_found("No signing key available"))
    }

    /// Record by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub async fn find_by_id(&self, id: &str) -> IdentityResult<SigningKeyPair> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| key_not_found(id))
    }

    /// All records, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self) -> IdentityResult<Vec<SigningKeyPair>> {
        self.store.list_newest_first().await
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> IdentityResult<()> {
        if !self.store.delete_by_id(id).await? {
            return Err(key_not_found(id));
        }
        info!(kid = %id, "Signing key deleted");
        Ok(())
    }

    /// Keep only the newest record. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    #[instrument(skip(self))]
    pub async fn delete_all_but_newest(&self) -> IdentityResult<u64> {
        let result = self.store.delete_all_but_newest().await;
        metrics::record_key_purge(result.is_ok());
        let removed = result?;
        info!(removed, "Purged retired signing keys");
        Ok(removed)
    }

    /// Delete every record.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_all(&self) -> IdentityResult<u64> {
        let removed = self.store.delete_all().await?;
        warn!(removed, "All signing keys deleted");
        Ok(removed)
    }

    /// Whether a record exists.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn exists_by_id(&self, id: &str) -> IdentityResult<bool> {
        Ok(self.store.find_by_id(id).await?.is_some())
    }

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn count(&self) -> IdentityResult<u64> {
        self.store.count().await
    }

    /// Decrypt a record into usable key material.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Crypto`] if decryption fails or the halves
    /// do not form a valid pair.
    pub fn decrypt(&self, pair: &SigningKeyPair) -> IdentityResult<RsaKeyMaterial> {
        let public_pem = self.encryptor.decrypt(&pair.encrypted_public_key)?;
        let private_pem = Zeroizing::new(self.encryptor.decrypt(&pair.encrypted_private_key)?);
        Ok(RsaKeyMaterial::from_pems(&pair.id, public_pem, private_pem)?)
    }

    /// Decrypted operator view of a record.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Crypto`] if decryption fails.
    pub fn view(&self, pair: &SigningKeyPair) -> IdentityResult<SigningKeyView> {
        let material = self.decrypt(pair)?;
        Ok(SigningKeyView::new(
            material.kid.clone(),
            material.public_pem.clone(),
            material.private_pem.to_string(),
            &pair.created_at,
        ))
    }

    /// Make sure at least one key exists, generating one if the store is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns crypto or storage failures from generation.
    #[instrument(skip(self))]
    pub async fn ensure_signing_key(&self) -> IdentityResult<RotationOutcome> {
        let _guard = self.rotation_lock.lock().await;
        let result = match self.store.find_newest().await {
            Ok(Some(existing)) => Ok(RotationOutcome::AlreadySatisfied { kid: existing.id }),
            Ok(None) => self.generate_and_save().await.map(RotationOutcome::Generated),
            Err(e) => Err(e),
        };
        record_rotation(RotationTrigger::Startup, &result);
        result
    }

    /// Rotate for a trigger observed at `requested_at`.
    ///
    /// If the newest key was created at or after `requested_at`, a
    /// concurrent rotation already served this trigger and nothing is
    /// generated.
    ///
    /// # Errors
    ///
    /// Returns crypto or storage failures from generation.
    #[instrument(skip(self))]
    pub async fn rotate(&self, requested_at: DateTime<Utc>) -> IdentityResult<RotationOutcome> {
        let requested_at = requested_at.trunc_subsecs(3);
        let _guard = self.rotation_lock.lock().await;
        let result = match self.store.find_newest().await {
            Ok(Some(newest)) if newest.created_at >= requested_at => {
                debug!(kid = %newest.id, "Rotation already served by a concurrent trigger");
                Ok(RotationOutcome::AlreadySatisfied { kid: newest.id })
            }
            Ok(_) => self.generate_and_save().await.map(RotationOutcome::Generated),
            Err(e) => Err(e),
        };
        record_rotation(RotationTrigger::Scheduled, &result);
        result
    }

    async fn generate_and_save(&self) -> IdentityResult<SigningKeyPair> {
        let material = tokio::task::spawn_blocking(RsaKeyMaterial::generate)
            .await
            .map_err(|e| IdentityError::internal(format!("key generation task failed: {e}")))??;
        let pair = self.save(&material).await?;
        info!(kid = %pair.id, "Generated new signing key");
        Ok(pair)
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

fn key_not_found(id: &str) -> IdentityError {
    IdentityError::not_found(format!("KeyPair with id: {id} not found"))
}

fn record_rotation(trigger: RotationTrigger, result: &IdentityResult<RotationOutcome>) {
    match result {
        Ok(outcome) => metrics::record_key_rotation(trigger.as_str(), outcome.label()),
        Err(e) => {
            warn!(trigger = trigger.as_str(), error = %e, "Key rotation failed");
            metrics::record_key_rotation(trigger.as_str(), "failed");
        }
    }
}
