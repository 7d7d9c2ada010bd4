//! Wiring of the identity components.

use crate::bootstrap::Bootstrap;
use crate::config::Config;
use crate::crypto::TextEncryptor;
use crate::error::IdentityResult;
use crate::keys::{InMemoryKeyStore, JwkSource, KeyManager, KeyStore};
use crate::rbac::{Argon2PasswordEncoder, RbacGraph, RbacStore, UserDetailsService};
use crate::scheduler::RotationScheduler;
use crate::tokens::{RoleClaimsCustomizer, TokenSigner, TokenVerifier};
use std::sync::Arc;

/// Every component of the identity core, sharing one key manager and one
/// RBAC store.
#[derive(Debug, Clone)]
pub struct IdentityCore {
    /// Signing key lifecycle
    pub keys: Arc<KeyManager>,
    /// Key source for signing and verification
    pub jwk_source: JwkSource,
    /// Token claim enrichment
    pub customizer: RoleClaimsCustomizer,
    /// Token signing
    pub signer: TokenSigner,
    /// Token verification
    pub verifier: TokenVerifier,
    /// Privileges, roles and users
    pub rbac: RbacGraph,
    /// Principal lookup
    pub user_details: UserDetailsService,
}

impl IdentityCore {
    /// Build over the given key store and RBAC store.
    #[must_use]
    pub fn new(key_store: Arc<dyn KeyStore>, rbac_store: Arc<RbacStore>, encryptor: TextEncryptor) -> Self {
        let keys = Arc::new(KeyManager::new(key_store, Arc::new(encryptor)));
        let jwk_source = JwkSource::new(Arc::clone(&keys));
        let rbac = RbacGraph::new(rbac_store, Arc::new(Argon2PasswordEncoder));
        Self {
            customizer: RoleClaimsCustomizer::new(Arc::clone(&keys)),
            signer: TokenSigner::new(jwk_source.clone()),
            verifier: TokenVerifier::new(jwk_source.clone()),
            user_details: rbac.user_details(),
            keys,
            jwk_source,
            rbac,
        }
    }

    /// Build with in-memory stores.
    #[must_use]
    pub fn in_memory(encryptor: TextEncryptor) -> Self {
        Self::new(
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(RbacStore::new()),
            encryptor,
        )
    }

    /// Build in-memory from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IdentityError::Crypto`] if the key-encryption key
    /// cannot be derived.
    pub fn from_config(config: &Config) -> IdentityResult<Self> {
        let encryptor = TextEncryptor::new(&config.enc_password, &config.enc_salt)?;
        Ok(Self::in_memory(encryptor))
    }

    /// Startup checks over this core.
    #[must_use]
    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap::new(Arc::clone(&self.keys), self.rbac.clone())
    }

    /// Rotation scheduler configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an interval is zero.
    pub fn scheduler(&self, config: &Config) -> IdentityResult<RotationScheduler> {
        RotationScheduler::new(
            Arc::clone(&self.keys),
            config.key_rotation_interval,
            config.key_purge_interval,
        )
    }
}
