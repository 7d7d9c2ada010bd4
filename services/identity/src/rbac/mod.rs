//! Privilege, role and user graph.
//!
//! Privileges attach to roles and roles attach to users through explicit
//! join rows. Entities flagged default are attached to every role (or
//! user) when created or promoted, and detached again on demotion or
//! deletion, inside the same transaction.

pub mod model;
pub mod password;
pub mod privileges;
pub mod roles;
pub mod store;
pub mod user_details;
pub mod users;
pub mod validation;

pub use model::{
    NewPrivilege, NewRole, NewUser, Privilege, PrivilegeUpdate, PrivilegeView, Role, RoleUpdate,
    RoleView, User, UserUpdate, UserView,
};
pub use password::{Argon2PasswordEncoder, PasswordEncoder};
pub use privileges::PrivilegeService;
pub use roles::RoleService;
pub use store::RbacStore;
pub use user_details::{UserDetails, UserDetailsService};
pub use users::UserService;

use crate::error::IdentityResult;
use crate::metrics;
use std::sync::Arc;
use tracing::debug;

/// The three entity services over one shared store.
#[derive(Debug, Clone)]
pub struct RbacGraph {
    /// Privileges
    pub privileges: PrivilegeService,
    /// Roles
    pub roles: RoleService,
    /// Users
    pub users: UserService,
}

impl RbacGraph {
    /// Build the services over `store`.
    #[must_use]
    pub fn new(store: Arc<RbacStore>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self {
            privileges: PrivilegeService::new(Arc::clone(&store)),
            roles: RoleService::new(Arc::clone(&store)),
            users: UserService::new(store, encoder),
        }
    }

    /// Empty in-memory graph with Argon2id password hashing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(RbacStore::new()), Arc::new(Argon2PasswordEncoder))
    }

    /// User lookup over this graph.
    #[must_use]
    pub fn user_details(&self) -> UserDetailsService {
        UserDetailsService::new(self.users.clone())
    }
}

/// Count a mutation result and log rejections.
fn audited<T>(entity: &'static str, operation: &'static str, result: IdentityResult<T>) -> IdentityResult<T> {
    metrics::record_rbac_mutation(entity, operation, &result);
    if let Err(e) = &result {
        debug!(entity, operation, error = %e, "RBAC mutation rejected");
    }
    result
}
