//! Privilege operations with default propagation onto roles.

use super::model::{NewPrivilege, Privilege, PrivilegeUpdate};
use super::store::{PrivilegeRow, RbacStore, RbacTables};
use super::validation::{check_label, normalize_label, Violations, LABEL_UNIQUE};
use super::audited;
use crate::error::{IdentityError, IdentityResult};
use crate::time::now_millis;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

const ENTITY: &str = "privilege";

/// Privilege CRUD.
#[derive(Debug, Clone)]
pub struct PrivilegeService {
    store: Arc<RbacStore>,
}

impl PrivilegeService {
    /// Create a service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<RbacStore>) -> Self {
        Self { store }
    }

    /// Create one privilege. A default privilege is attached to every
    /// existing role.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::ConstraintViolation`] for an invalid or
    /// duplicate label.
    #[instrument(skip(self, new), fields(label = %new.label))]
    pub async fn create(&self, new: NewPrivilege) -> IdentityResult<Privilege> {
        let result = self
            .store
            .transaction(|t| {
                let mut created = insert_all(t, std::slice::from_ref(&new))?;
                created
                    .pop()
                    .ok_or_else(|| IdentityError::internal("privilege insert returned nothing"))
            })
            .await;
        let privilege = audited(ENTITY, "create", result)?;
        info!(id = %privilege.id, label = %privilege.label, is_default = privilege.is_default, "Privilege created");
        Ok(privilege)
    }

    /// Create several privileges in one transaction. Labels colliding
    /// inside the batch are violations too.
    ///
    /// # Errors
    ///
    /// Returns one aggregated [`IdentityError::ConstraintViolation`]; nothing
    /// is created.
    #[instrument(skip_all, fields(count = batch.len()))]
    pub async fn create_many(&self, batch: Vec<NewPrivilege>) -> IdentityResult<Vec<Privilege>> {
        let result = self.store.transaction(|t| insert_all(t, &batch)).await;
        let created = audited(ENTITY, "create_many", result)?;
        info!(count = created.len(), "Privileges created");
        Ok(created)
    }

    /// Privilege by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub async fn find_by_id(&self, id: &str) -> IdentityResult<Privilege> {
        self.store
            .read(|t| t.privileges.get(id).map(|row| t.privilege(row)))
            .await
            .ok_or_else(|| not_found(id))
    }

    /// Known privileges among `ids`; unknown ids are skipped.
    pub async fn find_many_by_ids(&self, ids: Option<&[String]>) -> Vec<Privilege> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        self.store
            .read(|t| {
                ids.iter()
                    .filter_map(|id| t.privileges.get(id))
                    .map(|row| t.privilege(row))
                    .collect()
            })
            .await
    }

    /// All privileges in creation order.
    pub async fn find_all(&self) -> Vec<Privilege> {
        self.store.read(RbacTables::all_privileges).await
    }

    /// Default privileges in creation order.
    pub async fn find_all_defaults(&self) -> Vec<Privilege> {
        self.store
            .read(|t| {
                t.all_privileges()
                    .into_iter()
                    .filter(|p| p.is_default)
                    .collect()
            })
            .await
    }

    /// Change label and default flag. Promotion attaches the privilege to
    /// every role, demotion detaches it from every role.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id or
    /// [`IdentityError::ConstraintViolation`] for an invalid label.
    #[instrument(skip(self, update), fields(label = %update.label))]
    pub async fn update(&self, id: &str, update: PrivilegeUpdate) -> IdentityResult<Privilege> {
        let result = self
            .store
            .transaction(|t| {
                let mut row = t.privileges.get(id).cloned().ok_or_else(|| not_found(id))?;

                let mut violations = Violations::new();
                check_label(&mut violations, &update.label);
                let label = normalize_label(&update.label);
                violations.check(t.privilege_label_taken(&label, Some(id)), LABEL_UNIQUE);
                violations.into_result()?;

                let was_default = row.is_default;
                row.label = label;
                row.is_default = update.is_default;
                row.updated_at = now_millis();
                t.privileges.insert(row.id.clone(), row.clone());

                match (was_default, row.is_default) {
                    (false, true) => {
                        t.attach_privilege_to_all_roles(id);
                    }
                    (true, false) => {
                        t.detach_privilege_from_all_roles(id);
                    }
                    _ => {}
                }
                Ok(t.privilege(&row))
            })
            .await;
        let privilege = audited(ENTITY, "update", result)?;
        info!(id = %privilege.id, is_default = privilege.is_default, "Privilege updated");
        Ok(privilege)
    }

    /// Delete a privilege after detaching it from every role.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> IdentityResult<()> {
        let result = self
            .store
            .transaction(|t| {
                if !t.privileges.contains_key(id) {
                    return Err(not_found(id));
                }
                let detached = t.detach_privilege_from_all_roles(id);
                t.privileges.remove(id);
                Ok(detached)
            })
            .await;
        let detached = audited(ENTITY, "delete", result)?;
        info!(id = %id, detached, "Privilege deleted");
        Ok(())
    }

    /// Delete every privilege and every role attachment. Returns the number
    /// of privileges removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_all(&self) -> IdentityResult<u64> {
        let result = self
            .store
            .transaction(|t| {
                let removed = t.privileges.len() as u64;
                t.role_privileges.clear();
                t.privileges.clear();
                Ok(removed)
            })
            .await;
        audited(ENTITY, "delete_all", result)
    }

    /// Number of privileges.
    pub async fn count(&self) -> u64 {
        self.store.read(|t| t.privileges.len() as u64).await
    }

    /// Whether a privilege exists.
    pub async fn exists_by_id(&self, id: &str) -> bool {
        self.store.read(|t| t.privileges.contains_key(id)).await
    }
}

fn not_found(id: &str) -> IdentityError {
    IdentityError::not_found(format!("Privilege with id: {id} not found"))
}

fn insert_all(t: &mut RbacTables, batch: &[NewPrivilege]) -> IdentityResult<Vec<Privilege>> {
    let mut violations = Violations::new();
    let mut batch_labels = HashSet::new();
    for item in batch {
        check_label(&mut violations, &item.label);
        if item.label.trim().is_empty() {
            continue;
        }
        let label = normalize_label(&item.label);
        let taken = t.privilege_label_taken(&label, None);
        violations.check(taken || !batch_labels.insert(label), LABEL_UNIQUE);
    }
    violations.into_result()?;

    let now = now_millis();
    let mut created = Vec::with_capacity(batch.len());
    for item in batch {
        let row = PrivilegeRow {
            seq: t.next_seq(),
            id: uuid::Uuid::new_v4().to_string(),
            label: normalize_label(&item.label),
            is_default: item.is_default,
            created_at: now,
            updated_at: now,
        };
        if row.is_default {
            t.attach_privilege_to_all_roles(&row.id);
        }
        created.push(t.privilege(&row));
        t.privileges.insert(row.id.clone(), row);
    }
    Ok(created)
}
