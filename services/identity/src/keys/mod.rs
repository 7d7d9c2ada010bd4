//! Signing key lifecycle: storage, rotation and JWK publication.

pub mod jwk;
pub mod manager;
pub mod model;
pub mod store;

pub use jwk::{Jwk, JwkSource, Jwks, KeySelector, SigningJwk, SIGNING_ALGORITHM};
pub use manager::{KeyManager, RotationOutcome, RotationTrigger};
pub use model::{SigningKeyPair, SigningKeyView};
pub use store::{InMemoryKeyStore, KeyStore};
