//! First-start initialization.
//!
//! Guarantees a signing key exists and, when a seed document is supplied
//! and no user exists yet, creates the seed privileges, roles and users in
//! that order.

pub mod seed;

pub use seed::{SeedConfig, SeedPrivilege, SeedRole, SeedUser};

use crate::error::IdentityResult;
use crate::keys::{KeyManager, RotationOutcome};
use crate::rbac::validation::normalize_label;
use crate::rbac::{NewPrivilege, NewRole, NewUser, Privilege, RbacGraph, Role, User};
use rand::distributions::{Alphanumeric, DistString};
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Length of generated seed passwords.
pub const GENERATED_PASSWORD_LEN: usize = 10;

/// Password of a seeded user.
pub struct SeededCredential {
    /// Email
    pub email: String,
    /// Raw password
    pub password: SecretString,
    /// Whether the password was generated
    pub generated: bool,
}

impl fmt::Debug for SeededCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededCredential")
            .field("email", &self.email)
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

/// Entities created from a seed document.
#[derive(Debug, Default)]
pub struct SeedSummary {
    /// Created privileges
    pub privileges: Vec<Privilege>,
    /// Created roles
    pub roles: Vec<Role>,
    /// Created users
    pub users: Vec<User>,
    /// Credentials of the created users
    pub credentials: Vec<SeededCredential>,
}

/// What a bootstrap run did.
#[derive(Debug)]
pub struct BootstrapReport {
    /// Signing key check result
    pub key: RotationOutcome,
    /// Seeding result; `None` when skipped
    pub seeded: Option<SeedSummary>,
}

/// Runs the startup checks.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    keys: Arc<KeyManager>,
    rbac: RbacGraph,
}

impl Bootstrap {
    /// Create a bootstrap over the key manager and RBAC graph.
    #[must_use]
    pub const fn new(keys: Arc<KeyManager>, rbac: RbacGraph) -> Self {
        Self { keys, rbac }
    }

    /// Ensure a signing key and apply `seed` if no user exists.
    ///
    /// # Errors
    ///
    /// Returns key generation failures and seed validation failures.
    #[instrument(skip_all, fields(seed = seed.is_some()))]
    pub async fn run(&self, seed: Option<&SeedConfig>) -> IdentityResult<BootstrapReport> {
        let key = self.keys.ensure_signing_key().await?;
        if key.generated() {
            info!(kid = %key.kid(), "No signing key found, generated one");
        }

        let seeded = match seed {
            Some(seed) if self.rbac.users.count().await == 0 => Some(self.seed(seed).await?),
            Some(_) => {
                debug!("Users already present, skipping seed");
                None
            }
            None => None,
        };

        Ok(BootstrapReport { key, seeded })
    }

    async fn seed(&self, seed: &SeedConfig) -> IdentityResult<SeedSummary> {
        let privileges = self
            .rbac
            .privileges
            .create_many(
                seed.privileges
                    .iter()
                    .map(|p| NewPrivilege::new(&p.label, p.is_default))
                    .collect(),
            )
            .await?;

        let roles = self
            .rbac
            .roles
            .create_many(
                seed.roles
                    .iter()
                    .map(|r| {
                        let ids = privileges
                            .iter()
                            .filter(|p| r.privileges.iter().any(|l| normalize_label(l) == p.label))
                            .map(|p| p.id.clone())
                            .collect();
                        NewRole::new(&r.label, r.is_default, Some(ids))
                    })
                    .collect(),
            )
            .await?;

        let mut credentials = Vec::with_capacity(seed.users.len());
        let mut new_users = Vec::with_capacity(seed.users.len());
        for u in &seed.users {
            let (password, generated) = match u.password.as_deref() {
                Some(p) if !p.trim().is_empty() => (p.to_string(), false),
                _ => (generate_password(), true),
            };
            let ids = roles
                .iter()
                .filter(|r| u.roles.iter().any(|l| normalize_label(l) == r.label))
                .map(|r| r.id.clone())
                .collect();
            debug!(email = %u.email, generated, "Seeding user");
            new_users.push(NewUser::new(&u.email, password.clone(), Some(ids)));
            credentials.push(SeededCredential {
                email: u.email.clone(),
                password: SecretString::from(password),
                generated,
            });
        }
        let users = self.rbac.users.create_many(new_users).await?;

        info!(
            privileges = privileges.len(),
            roles = roles.len(),
            users = users.len(),
            "Seeded RBAC data"
        );
        Ok(SeedSummary {
            privileges,
            roles,
            users,
            credentials,
        })
    }
}

/// Random alphanumeric password for seed users without one.
#[must_use]
pub fn generate_password() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), GENERATED_PASSWORD_LEN)
}
