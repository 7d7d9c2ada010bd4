//! Role operations with default propagation onto users.

use super::audited;
use super::model::{NewRole, Role, RoleUpdate};
use super::store::{merge_ids, RbacStore, RbacTables, RoleRow};
use super::validation::{
    check_label, normalize_label, Violations, LABEL_UNIQUE, PRIVILEGES_NOT_EMPTY,
};
use crate::error::{IdentityError, IdentityResult};
use crate::time::now_millis;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

const ENTITY: &str = "role";

/// Role CRUD.
#[derive(Debug, Clone)]
pub struct RoleService {
    store: Arc<RbacStore>,
}

impl RoleService {
    /// Create a service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<RbacStore>) -> Self {
        Self { store }
    }

    /// Create one role holding the default privileges plus the known
    /// requested ones. A default role is attached to every existing user.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::ConstraintViolation`] for an invalid or
    /// duplicate label or an empty resulting privilege set.
    #[instrument(skip(self, new), fields(label = %new.label))]
    pub async fn create(&self, new: NewRole) -> IdentityResult<Role> {
        let result = self
            .store
            .transaction(|t| {
                let mut created = insert_all(t, std::slice::from_ref(&new))?;
                created
                    .pop()
                    .ok_or_else(|| IdentityError::internal("role insert returned nothing"))
            })
            .await;
        let role = audited(ENTITY, "create", result)?;
        info!(id = %role.id, label = %role.label, privileges = role.privileges.len(), "Role created");
        Ok(role)
    }

    /// Create several roles in one transaction.
    ///
    /// # Errors
    ///
    /// Returns one aggregated [`IdentityError::ConstraintViolation`]; nothing
    /// is created.
    #[instrument(skip_all, fields(count = batch.len()))]
    pub async fn create_many(&self, batch: Vec<NewRole>) -> IdentityResult<Vec<Role>> {
        let result = self.store.transaction(|t| insert_all(t, &batch)).await;
        let created = audited(ENTITY, "create_many", result)?;
        info!(count = created.len(), "Roles created");
        Ok(created)
    }

    /// Role by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub async fn find_by_id(&self, id: &str) -> IdentityResult<Role> {
        self.store
            .read(|t| t.roles.get(id).map(|row| t.role(row)))
            .await
            .ok_or_else(|| not_found(id))
    }

    /// Known roles among `ids`; unknown ids are skipped.
    pub async fn find_many_by_ids(&self, ids: Option<&[String]>) -> Vec<Role> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        self.store
            .read(|t| {
                ids.iter()
                    .filter_map(|id| t.roles.get(id))
                    .map(|row| t.role(row))
                    .collect()
            })
            .await
    }

    /// All roles in creation order.
    pub async fn find_all(&self) -> Vec<Role> {
        self.store.read(RbacTables::all_roles).await
    }

    /// Default roles in creation order.
    pub async fn find_all_defaults(&self) -> Vec<Role> {
        self.store
            .read(|t| t.all_roles().into_iter().filter(|r| r.is_default).collect())
            .await
    }

    /// Change label and default flag and replace the privilege set with the
    /// known ids among `update.privileges`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id or
    /// [`IdentityError::ConstraintViolation`] for an invalid label or an
    /// empty resulting privilege set. The role is unchanged on error.
    #[instrument(skip(self, update), fields(label = %update.label))]
    pub async fn update(&self, id: &str, update: RoleUpdate) -> IdentityResult<Role> {
        let result = self
            .store
            .transaction(|t| {
                let mut row = t.roles.get(id).cloned().ok_or_else(|| not_found(id))?;

                let mut violations = Violations::new();
                check_label(&mut violations, &update.label);
                let label = normalize_label(&update.label);
                violations.check(t.role_label_taken(&label, Some(id)), LABEL_UNIQUE);
                let privileges = t.known_privilege_ids(&update.privileges);
                violations.check(privileges.is_empty(), PRIVILEGES_NOT_EMPTY);
                violations.into_result()?;

                let was_default = row.is_default;
                row.label = label;
                row.is_default = update.is_default;
                row.updated_at = now_millis();
                t.roles.insert(row.id.clone(), row.clone());
                t.set_role_privileges(id, &privileges);

                match (was_default, row.is_default) {
                    (false, true) => {
                        t.attach_role_to_all_users(id);
                    }
                    (true, false) => {
                        t.detach_role_from_all_users(id);
                    }
                    _ => {}
                }
                Ok(t.role(&row))
            })
            .await;
        let role = audited(ENTITY, "update", result)?;
        info!(id = %role.id, is_default = role.is_default, privileges = role.privileges.len(), "Role updated");
        Ok(role)
    }

    /// Delete a role with its join rows on both sides. Privileges and users
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> IdentityResult<()> {
        let result = self
            .store
            .transaction(|t| {
                if !t.roles.contains_key(id) {
                    return Err(not_found(id));
                }
                let detached = t.detach_role_from_all_users(id);
                t.set_role_privileges(id, &[]);
                t.roles.remove(id);
                Ok(detached)
            })
            .await;
        let detached = audited(ENTITY, "delete", result)?;
        info!(id = %id, detached, "Role deleted");
        Ok(())
    }

    /// Delete every role and all role join rows. Returns the number of
    /// roles removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_all(&self) -> IdentityResult<u64> {
        let result = self
            .store
            .transaction(|t| {
                let removed = t.roles.len() as u64;
                t.user_roles.clear();
                t.role_privileges.clear();
                t.roles.clear();
                Ok(removed)
            })
            .await;
        audited(ENTITY, "delete_all", result)
    }

    /// Number of roles.
    pub async fn count(&self) -> u64 {
        self.store.read(|t| t.roles.len() as u64).await
    }

    /// Whether a role exists.
    pub async fn exists_by_id(&self, id: &str) -> bool {
        self.store.read(|t| t.roles.contains_key(id)).await
    }
}

fn not_found(id: &str) -> IdentityError {
    IdentityError::not_found(format!("Role with id: {id} not found"))
}

fn insert_all(t: &mut RbacTables, batch: &[NewRole]) -> IdentityResult<Vec<Role>> {
    let defaults = t.default_privilege_ids();
    let mut violations = Violations::new();
    let mut batch_labels = HashSet::new();
    let mut resolved = Vec::with_capacity(batch.len());
    for item in batch {
        check_label(&mut violations, &item.label);
        if !item.label.trim().is_empty() {
            let label = normalize_label(&item.label);
            let taken = t.role_label_taken(&label, None);
            violations.check(taken || !batch_labels.insert(label), LABEL_UNIQUE);
        }
        let requested = t.known_privilege_ids(item.privileges.as_deref().unwrap_or_default());
        let privileges = merge_ids(defaults.clone(), requested);
        violations.check(privileges.is_empty(), PRIVILEGES_NOT_EMPTY);
        resolved.push(privileges);
    }
    violations.into_result()?;

    let now = now_millis();
    let mut created = Vec::with_capacity(batch.len());
    for (item, privileges) in batch.iter().zip(resolved) {
        let row = RoleRow {
            seq: t.next_seq(),
            id: uuid::Uuid::new_v4().to_string(),
            label: normalize_label(&item.label),
            is_default: item.is_default,
            created_at: now,
            updated_at: now,
        };
        t.roles.insert(row.id.clone(), row.clone());
        t.set_role_privileges(&row.id, &privileges);
        if row.is_default {
            t.attach_role_to_all_users(&row.id);
        }
        created.push(t.role(&row));
    }
    Ok(created)
}
