//! In-memory RBAC tables with copy-on-write transactions.

use super::model::{Privilege, Role, User};
use crate::error::IdentityResult;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub(crate) struct PrivilegeRow {
    pub seq: u64,
    pub id: String,
    pub label: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct RoleRow {
    pub seq: u64,
    pub id: String,
    pub label: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct UserRow {
    pub seq: u64,
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entity tables and the two join relations.
#[derive(Debug, Clone, Default)]
pub struct RbacTables {
    next_seq: u64,
    pub(crate) privileges: BTreeMap<String, PrivilegeRow>,
    pub(crate) roles: BTreeMap<String, RoleRow>,
    pub(crate) users: BTreeMap<String, UserRow>,
    /// (role id, privilege id)
    pub(crate) role_privileges: BTreeSet<(String, String)>,
    /// (user id, role id)
    pub(crate) user_roles: BTreeSet<(String, String)>,
}

impl RbacTables {
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // Privileges

    pub(crate) fn privilege_label_taken(&self, label: &str, except: Option<&str>) -> bool {
        self.privileges
            .values()
            .any(|p| p.label == label && Some(p.id.as_str()) != except)
    }

    pub(crate) fn privilege(&self, row: &PrivilegeRow) -> Privilege {
        Privilege {
            id: row.id.clone(),
            label: row.label.clone(),
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub(crate) fn all_privileges(&self) -> Vec<Privilege> {
        let mut rows: Vec<_> = self.privileges.values().collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| self.privilege(r)).collect()
    }

    pub(crate) fn default_privilege_ids(&self) -> Vec<String> {
        let mut rows: Vec<_> = self.privileges.values().filter(|p| p.is_default).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.id.clone()).collect()
    }

    pub(crate) fn known_privilege_ids(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| self.privileges.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Attach a privilege to every role, returning how many roles gained it.
    pub(crate) fn attach_privilege_to_all_roles(&mut self, privilege_id: &str) -> usize {
        let role_ids: Vec<String> = self.roles.keys().cloned().collect();
        role_ids
            .into_iter()
            .filter(|role_id| {
                self.role_privileges
                    .insert((role_id.clone(), privilege_id.to_string()))
            })
            .count()
    }

    /// Detach a privilege from every role, returning how many roles lost it.
    pub(crate) fn detach_privilege_from_all_roles(&mut self, privilege_id: &str) -> usize {
        let before = self.role_privileges.len();
        self.role_privileges.retain(|(_, p)| p != privilege_id);
        before - self.role_privileges.len()
    }

    // Roles

    pub(crate) fn role_label_taken(&self, label: &str, except: Option<&str>) -> bool {
        self.roles
            .values()
            .any(|r| r.label == label && Some(r.id.as_str()) != except)
    }

    pub(crate) fn role(&self, row: &RoleRow) -> Role {
        let mut privileges: Vec<Privilege> = self
            .role_privileges
            .iter()
            .filter(|(role_id, _)| *role_id == row.id)
            .filter_map(|(_, privilege_id)| self.privileges.get(privilege_id))
            .map(|p| self.privilege(p))
            .collect();
        privileges.sort_by(|a, b| a.label.cmp(&b.label));
        Role {
            id: row.id.clone(),
            label: row.label.clone(),
            is_default: row.is_default,
            privileges,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub(crate) fn all_roles(&self) -> Vec<Role> {
        let mut rows: Vec<_> = self.roles.values().collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| self.role(r)).collect()
    }

    pub(crate) fn default_role_ids(&self) -> Vec<String> {
        let mut rows: Vec<_> = self.roles.values().filter(|r| r.is_default).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.id.clone()).collect()
    }

    pub(crate) fn known_role_ids(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| self.roles.contains_key(*id))
            .cloned()
            .collect()
    }

    pub(crate) fn set_role_privileges(&mut self, role_id: &str, privilege_ids: &[String]) {
        self.role_privileges.retain(|(r, _)| r != role_id);
        for privilege_id in privilege_ids {
            self.role_privileges
                .insert((role_id.to_string(), privilege_id.clone()));
        }
    }

    /// Attach a role to every user, returning how many users gained it.
    pub(crate) fn attach_role_to_all_users(&mut self, role_id: &str) -> usize {
        let user_ids: Vec<String> = self.users.keys().cloned().collect();
        user_ids
            .into_iter()
            .filter(|user_id| self.user_roles.insert((user_id.clone(), role_id.to_string())))
            .count()
    }

    /// Detach a role from every user, returning how many users lost it.
    pub(crate) fn detach_role_from_all_users(&mut self, role_id: &str) -> usize {
        let before = self.user_roles.len();
        self.user_roles.retain(|(_, r)| r != role_id);
        before - self.user_roles.len()
    }

    // Users

    pub(crate) fn email_taken(&self, email: &str, except: Option<&str>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id.as_str()) != except)
    }

    pub(crate) fn user(&self, row: &UserRow) -> User {
        let mut roles: Vec<Role> = self
            .user_roles
            .iter()
            .filter(|(user_id, _)| *user_id == row.id)
            .filter_map(|(_, role_id)| self.roles.get(role_id))
            .map(|r| self.role(r))
            .collect();
        roles.sort_by(|a, b| a.label.cmp(&b.label));
        User {
            id: row.id.clone(),
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub(crate) fn all_users(&self) -> Vec<User> {
        let mut rows: Vec<_> = self.users.values().collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| self.user(r)).collect()
    }

    pub(crate) fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| self.user(u))
    }

    pub(crate) fn set_user_roles(&mut self, user_id: &str, role_ids: &[String]) {
        self.user_roles.retain(|(u, _)| u != user_id);
        for role_id in role_ids {
            self.user_roles.insert((user_id.to_string(), role_id.clone()));
        }
    }
}

/// Union of `defaults` and `requested`, keeping first-seen order.
pub(crate) fn merge_ids(defaults: Vec<String>, requested: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    defaults
        .into_iter()
        .chain(requested)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Shared RBAC state guarded by a single writer lock.
///
/// Mutations run against a working copy that replaces the committed tables
/// only when the closure succeeds, so a failed call leaves no trace.
#[derive(Debug, Default)]
pub struct RbacStore {
    tables: RwLock<RbacTables>,
}

impl RbacStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only query.
    pub async fn read<T>(&self, f: impl FnOnce(&RbacTables) -> T) -> T {
        let tables = self.tables.read().await;
        f(&tables)
    }

    /// Run a mutation atomically.
    ///
    /// The closure works on a full copy of the tables, taken under the write
    /// lock, so every write costs O(graph size). A durable backend should use
    /// its own transactions instead.
    ///
    /// # Errors
    ///
    /// Returns the closure's error; the committed state is then unchanged.
    pub async fn transaction<T>(
        &self,
        f: impl FnOnce(&mut RbacTables) -> IdentityResult<T>,
    ) -> IdentityResult<T> {
        let mut committed = self.tables.write().await;
        let mut working = committed.clone();
        let out = f(&mut working)?;
        *committed = working;
        Ok(out)
    }
}
