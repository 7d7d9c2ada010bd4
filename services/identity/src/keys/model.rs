//! Signing key records.

use crate::time::format_instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted signing key pair. Both halves are ciphertext of PEM text.
///
/// Records are immutable once stored; rotation adds records, purge removes
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyPair {
    /// Key id, also the JWT `kid`
    pub id: String,
    /// Encrypted SPKI PEM
    pub encrypted_public_key: String,
    /// Encrypted PKCS#8 PEM
    pub encrypted_private_key: String,
    /// Creation time, millisecond precision
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Decrypted view of a key pair for the operator key endpoint.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyView {
    /// Key id
    pub id: String,
    /// SPKI PEM
    pub public_key: String,
    /// PKCS#8 PEM
    pub private_key: String,
    /// RFC 3339 creation time
    pub created_at: String,
}

impl SigningKeyView {
    pub(crate) fn new(id: String, public_key: String, private_key: String, created_at: &DateTime<Utc>) -> Self {
        Self {
            id,
            public_key,
            private_key,
            created_at: format_instant(created_at),
        }
    }
}

impl fmt::Debug for SigningKeyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyView")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}
