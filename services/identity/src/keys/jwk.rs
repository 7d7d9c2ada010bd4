//! JWK views of stored signing keys.

use super::manager::KeyManager;
use super::model::SigningKeyPair;
use crate::crypto::RsaKeyMaterial;
use crate::error::{IdentityError, IdentityResult};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Algorithm every stored key is used with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Public JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type
    pub kty: String,
    /// Key id
    pub kid: String,
    /// Intended use
    #[serde(rename = "use")]
    pub key_use: String,
    /// Algorithm
    pub alg: String,
    /// Modulus, base64url
    pub n: String,
    /// Exponent, base64url
    pub e: String,
}

impl Jwk {
    fn rsa_signing(kid: &str, n: String, e: String) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            n,
            e,
        }
    }
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Keys, newest first
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Find a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Internal`] if serialization fails.
    pub fn to_json(&self) -> IdentityResult<String> {
        serde_json::to_string(self).map_err(|e| IdentityError::internal(e.to_string()))
    }
}

/// Criteria a signing framework uses to pick keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySelector {
    /// Required key id
    pub key_id: Option<String>,
    /// Required algorithm
    pub algorithm: Option<Algorithm>,
}

impl KeySelector {
    /// Selector matching every key.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Selector matching one key id.
    #[must_use]
    pub fn by_key_id(kid: impl Into<String>) -> Self {
        Self {
            key_id: Some(kid.into()),
            algorithm: None,
        }
    }

    /// Restrict to an algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Whether a key with this id and algorithm is selected.
    #[must_use]
    pub fn matches(&self, kid: &str, algorithm: Algorithm) -> bool {
        self.key_id.as_deref().is_none_or(|wanted| wanted == kid)
            && self.algorithm.is_none_or(|wanted| wanted == algorithm)
    }
}

/// Decrypted key ready for signing and verification.
#[derive(Clone)]
pub struct SigningJwk {
    /// Key id
    pub kid: String,
    /// Always RS256
    pub algorithm: Algorithm,
    /// Private half
    pub encoding_key: EncodingKey,
    /// Public half
    pub decoding_key: DecodingKey,
    /// Published form
    pub jwk: Jwk,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

impl SigningJwk {
    fn from_material(material: &RsaKeyMaterial, created_at: DateTime<Utc>) -> IdentityResult<Self> {
        let (n, e) = material.jwk_components()?;
        let encoding_key = EncodingKey::from_rsa_pem(material.private_pem.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)?;
        Ok(Self {
            kid: material.kid.clone(),
            algorithm: SIGNING_ALGORITHM,
            encoding_key,
            decoding_key,
            jwk: Jwk::rsa_signing(&material.kid, n, e),
            created_at,
        })
    }
}

impl fmt::Debug for SigningJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningJwk")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Serves stored keys to the token framework.
///
/// Every retained key is offered, newest first, so tokens signed before a
/// rotation keep verifying until the old key is purged.
#[derive(Debug, Clone)]
pub struct JwkSource {
    keys: Arc<KeyManager>,
}

impl JwkSource {
    /// Create a source over a key manager.
    #[must_use]
    pub const fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Keys matching the selector, newest first.
    ///
    /// # Errors
    ///
    /// Returns crypto failures if a stored key cannot be decrypted.
    pub async fn get(&self, selector: &KeySelector) -> IdentityResult<Vec<SigningJwk>> {
        self.keys
            .list()
            .await?
            .iter()
            .filter(|pair| selector.matches(&pair.id, SIGNING_ALGORITHM))
            .map(|pair| self.to_signing_jwk(pair))
            .collect()
    }

    /// The newest key, the one new tokens are signed with.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] if no key exists.
    pub async fn signing_key(&self) -> IdentityResult<SigningJwk> {
        let newest = self.keys.find_newest().await?;
        self.to_signing_jwk(&newest)
    }

    /// Public key set for the JWKS endpoint.
    ///
    /// # Errors
    ///
    /// Returns crypto failures if a stored key cannot be decrypted.
    pub async fn jwks(&self) -> IdentityResult<Jwks> {
        let keys = self
            .get(&KeySelector::any())
            .await?
            .into_iter()
            .map(|k| k.jwk)
            .collect();
        Ok(Jwks { keys })
    }

    fn to_signing_jwk(&self, pair: &SigningKeyPair) -> IdentityResult<SigningJwk> {
        let material = self.keys.decrypt(pair)?;
        SigningJwk::from_material(&material, pair.created_at)
    }
}
