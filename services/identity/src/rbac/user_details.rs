//! Principal lookup for authentication.

use super::users::UserService;
use crate::error::IdentityResult;
use std::fmt;
use tracing::{debug, instrument};

/// Authentication view of a user.
#[derive(Clone, PartialEq, Eq)]
pub struct UserDetails {
    /// User id
    pub id: String,
    /// Email used as username
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Role labels followed by privilege labels, de-duplicated
    pub authorities: Vec<String>,
}

impl fmt::Debug for UserDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetails")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("authorities", &self.authorities)
            .finish_non_exhaustive()
    }
}

/// Resolves users and their flattened authorities.
#[derive(Debug, Clone)]
pub struct UserDetailsService {
    users: UserService,
}

impl UserDetailsService {
    /// Create a lookup over the user service.
    #[must_use]
    pub const fn new(users: UserService) -> Self {
        Self { users }
    }

    /// Load a user by email.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IdentityError::NotFound`] for an unknown email.
    #[instrument(skip(self))]
    pub async fn load_user_by_username(&self, email: &str) -> IdentityResult<UserDetails> {
        let user = self.users.find_by_email(email).await?;

        let mut authorities: Vec<String> = Vec::new();
        let role_labels = user.roles.iter().map(|r| &r.label);
        let privilege_labels = user
            .roles
            .iter()
            .flat_map(|r| r.privileges.iter().map(|p| &p.label));
        for label in role_labels.chain(privilege_labels) {
            if !authorities.contains(label) {
                authorities.push(label.clone());
            }
        }
        debug!(authorities = authorities.len(), "Loaded user details");

        Ok(UserDetails {
            id: user.id,
            username: user.email,
            password_hash: user.password_hash,
            authorities,
        })
    }

    /// Check a raw password against the loaded details.
    #[must_use]
    pub fn verify_password(&self, details: &UserDetails, raw: &str) -> bool {
        self.users.verify_password(raw, &details.password_hash)
    }
}
