//! JWT signing and verification against the stored key set.

use super::context::string_set;
use super::customizer::SCOPE_CLAIM;
use crate::error::{IdentityError, IdentityResult};
use crate::keys::{JwkSource, KeySelector, SIGNING_ALGORITHM};
use jsonwebtoken::{decode, decode_header, encode, Header, Validation};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};

/// Signs claim sets with stored keys.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    source: JwkSource,
}

impl TokenSigner {
    /// Create a signer over a key source.
    #[must_use]
    pub const fn new(source: JwkSource) -> Self {
        Self { source }
    }

    /// Encode and sign.
    ///
    /// Uses the key named by the header `kid`, or the newest key when the
    /// header carries none. The header algorithm is forced to RS256.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] if `kid` names no retained key and
    /// [`IdentityError::Token`] if encoding fails.
    #[instrument(skip_all, fields(kid = ?header.kid))]
    pub async fn sign(&self, header: &Header, claims: &Map<String, Value>) -> IdentityResult<String> {
        let key = match &header.kid {
            Some(kid) => self
                .source
                .get(&KeySelector::by_key_id(kid))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| IdentityError::not_found(format!("KeyPair with id: {kid} not found")))?,
            None => self.source.signing_key().await?,
        };

        let mut header = header.clone();
        header.alg = SIGNING_ALGORITHM;
        header.kid = Some(key.kid.clone());

        let token = encode(&header, claims, &key.encoding_key)?;
        debug!(kid = %key.kid, "Token signed");
        Ok(token)
    }
}

/// Verifies tokens against every retained key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    source: JwkSource,
}

impl TokenVerifier {
    /// Create a verifier over a key source.
    #[must_use]
    pub const fn new(source: JwkSource) -> Self {
        Self { source }
    }

    /// Verify the signature and return the claims.
    ///
    /// The key is chosen by the header `kid`. Expiry is checked when `exp`
    /// is present; audience is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Token`] for a malformed, expired or badly
    /// signed token, or one whose `kid` is unknown.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> IdentityResult<Map<String, Value>> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::token("Missing kid in token header"))?;

        let key = self
            .source
            .get(&KeySelector::by_key_id(&kid).with_algorithm(header.alg))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::token(format!("Unknown signing key: {kid}")))?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<Map<String, Value>>(token, &key.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Authority labels granted by a verified token's `scope` claim, without
/// any prefix.
#[must_use]
pub fn authorities_from_scope(claims: &Map<String, Value>) -> BTreeSet<String> {
    claims
        .get(SCOPE_CLAIM)
        .and_then(string_set)
        .unwrap_or_default()
}
