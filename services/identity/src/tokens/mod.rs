//! Token claim enrichment, signing and verification.

pub mod codec;
pub mod context;
pub mod customizer;

pub use codec::{authorities_from_scope, TokenSigner, TokenVerifier};
pub use context::{GrantType, JwtEncodingContext, Principal, TokenKind};
pub use customizer::{RoleClaimsCustomizer, TokenCustomizer, ROLES_CLAIM, ROLE_PREFIX, SCOPE_CLAIM};
