//! Claim enrichment applied to every issued token.

use super::context::{to_json_array, GrantType, JwtEncodingContext, TokenKind};
use crate::error::IdentityResult;
use crate::keys::KeyManager;
use crate::metrics;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Prefix some frameworks put on role authorities.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Claim carrying role labels.
pub const ROLES_CLAIM: &str = "roles";

/// Claim carrying granted scopes.
pub const SCOPE_CLAIM: &str = "scope";

/// Hook run on each token before it is signed.
#[async_trait]
pub trait TokenCustomizer: Send + Sync {
    /// Adjust header and claims in place.
    async fn customize(&self, context: &mut JwtEncodingContext) -> IdentityResult<()>;
}

/// Sets the signing `kid` and derives `roles`/`scope` claims from the
/// grant and the principal's authorities.
#[derive(Debug, Clone)]
pub struct RoleClaimsCustomizer {
    keys: Arc<KeyManager>,
}

impl RoleClaimsCustomizer {
    /// Create a customizer bound to a key manager.
    #[must_use]
    pub const fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl TokenCustomizer for RoleClaimsCustomizer {
    #[instrument(skip(self, context), fields(grant = %context.grant_type, kind = context.token_kind.as_str()))]
    async fn customize(&self, context: &mut JwtEncodingContext) -> IdentityResult<()> {
        let newest = self.keys.find_newest().await?;
        context.header.kid = Some(newest.id);

        metrics::record_token_customized(context.grant_type.as_str(), context.token_kind.as_str());

        if context.token_kind != TokenKind::AccessToken {
            return Ok(());
        }

        match (&context.grant_type, &context.principal) {
            (GrantType::ClientCredentials, _) => {
                let roles = to_json_array(&context.authorized_scopes);
                context.claims.insert(ROLES_CLAIM.to_string(), roles);
            }
            (GrantType::AuthorizationCode, Some(principal)) => {
                let roles = strip_role_prefix(&principal.authorities);
                let scope: BTreeSet<String> =
                    context.authorized_scopes.union(&roles).cloned().collect();
                debug!(roles = roles.len(), scopes = scope.len(), "Derived user role claims");
                context
                    .claims
                    .insert(ROLES_CLAIM.to_string(), to_json_array(&roles));
                context
                    .claims
                    .insert(SCOPE_CLAIM.to_string(), to_json_array(&scope));
            }
            _ => {}
        }
        Ok(())
    }
}

fn strip_role_prefix(authorities: &[String]) -> BTreeSet<String> {
    authorities
        .iter()
        .map(|a| a.strip_prefix(ROLE_PREFIX).unwrap_or(a).to_string())
        .collect()
}
