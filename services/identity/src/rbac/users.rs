//! User operations.

use super::audited;
use super::model::{NewUser, User, UserUpdate};
use super::password::PasswordEncoder;
use super::store::{merge_ids, RbacStore, RbacTables, UserRow};
use super::validation::{check_email, check_password, Violations, EMAIL_UNIQUE};
use crate::error::{IdentityError, IdentityResult};
use crate::time::now_millis;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

const ENTITY: &str = "user";

/// User CRUD. Passwords are hashed before they reach the store.
#[derive(Clone)]
pub struct UserService {
    store: Arc<RbacStore>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl UserService {
    /// Create a service over a shared store.
    #[must_use]
    pub fn new(store: Arc<RbacStore>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { store, encoder }
    }

    /// Create one user holding the default roles plus the known requested
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::ConstraintViolation`] for an invalid or
    /// duplicate email or a blank password.
    #[instrument(skip(self, new), fields(email = %new.email))]
    pub async fn create(&self, new: NewUser) -> IdentityResult<User> {
        let mut created = self.create_batch("create", vec![new]).await?;
        let user = created
            .pop()
            .ok_or_else(|| IdentityError::internal("user insert returned nothing"))?;
        info!(id = %user.id, roles = user.roles.len(), "User created");
        Ok(user)
    }

    /// Create several users in one transaction. Emails colliding inside the
    /// batch are violations too.
    ///
    /// # Errors
    ///
    /// Returns one aggregated [`IdentityError::ConstraintViolation`]; nothing
    /// is created.
    #[instrument(skip_all, fields(count = batch.len()))]
    pub async fn create_many(&self, batch: Vec<NewUser>) -> IdentityResult<Vec<User>> {
        let created = self.create_batch("create_many", batch).await?;
        info!(count = created.len(), "Users created");
        Ok(created)
    }

    async fn create_batch(&self, operation: &'static str, batch: Vec<NewUser>) -> IdentityResult<Vec<User>> {
        let mut violations = Violations::new();
        let mut hashes = Vec::with_capacity(batch.len());
        for item in &batch {
            hashes.push(self.hash_checked(&mut violations, &item.password)?);
        }

        let result = self
            .store
            .transaction(|t| {
                let defaults = t.default_role_ids();
                let mut batch_emails = Vec::<&str>::with_capacity(batch.len());
                for item in &batch {
                    check_email(&mut violations, &item.email);
                    if !item.email.trim().is_empty() {
                        let duplicate = batch_emails
                            .iter()
                            .any(|seen| seen.eq_ignore_ascii_case(&item.email));
                        violations.check(t.email_taken(&item.email, None) || duplicate, EMAIL_UNIQUE);
                        batch_emails.push(&item.email);
                    }
                }
                violations.into_result()?;

                let now = now_millis();
                let mut created = Vec::with_capacity(batch.len());
                for (item, hash) in batch.iter().zip(hashes) {
                    let row = UserRow {
                        seq: t.next_seq(),
                        id: uuid::Uuid::new_v4().to_string(),
                        email: item.email.clone(),
                        password_hash: hash.unwrap_or_default(),
                        created_at: now,
                        updated_at: now,
                    };
                    let requested = t.known_role_ids(item.roles.as_deref().unwrap_or_default());
                    t.users.insert(row.id.clone(), row.clone());
                    t.set_user_roles(&row.id, &merge_ids(defaults.clone(), requested));
                    created.push(t.user(&row));
                }
                Ok(created)
            })
            .await;
        audited(ENTITY, operation, result)
    }

    /// User by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub async fn find_by_id(&self, id: &str) -> IdentityResult<User> {
        self.store
            .read(|t| t.users.get(id).map(|row| t.user(row)))
            .await
            .ok_or_else(|| not_found(id))
    }

    /// User by email, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown email.
    pub async fn find_by_email(&self, email: &str) -> IdentityResult<User> {
        self.store
            .read(|t| t.user_by_email(email))
            .await
            .ok_or_else(|| IdentityError::not_found(format!("User with email: {email} not found")))
    }

    /// Known users among `ids`; unknown ids are skipped.
    pub async fn find_many_by_ids(&self, ids: Option<&[String]>) -> Vec<User> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        self.store
            .read(|t| {
                ids.iter()
                    .filter_map(|id| t.users.get(id))
                    .map(|row| t.user(row))
                    .collect()
            })
            .await
    }

    /// All users in creation order.
    pub async fn find_all(&self) -> Vec<User> {
        self.store.read(RbacTables::all_users).await
    }

    /// Change email and password and replace the role set with the known
    /// ids among `update.roles`. The password is re-hashed.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id or
    /// [`IdentityError::ConstraintViolation`] for an invalid or duplicate
    /// email or a blank password.
    #[instrument(skip(self, update), fields(email = %update.email))]
    pub async fn update(&self, id: &str, update: UserUpdate) -> IdentityResult<User> {
        let mut violations = Violations::new();
        let hash = self.hash_checked(&mut violations, &update.password)?;

        let result = self
            .store
            .transaction(|t| {
                let mut row = t.users.get(id).cloned().ok_or_else(|| not_found(id))?;

                check_email(&mut violations, &update.email);
                violations.check(t.email_taken(&update.email, Some(id)), EMAIL_UNIQUE);
                violations.into_result()?;

                row.email.clone_from(&update.email);
                row.password_hash = hash.unwrap_or_default();
                row.updated_at = now_millis();
                t.users.insert(row.id.clone(), row.clone());
                let roles = t.known_role_ids(&update.roles);
                t.set_user_roles(id, &roles);
                Ok(t.user(&row))
            })
            .await;
        let user = audited(ENTITY, "update", result)?;
        info!(id = %user.id, roles = user.roles.len(), "User updated");
        Ok(user)
    }

    /// Delete a user and its role attachments. Roles are kept.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> IdentityResult<()> {
        let result = self
            .store
            .transaction(|t| {
                if t.users.remove(id).is_none() {
                    return Err(not_found(id));
                }
                t.set_user_roles(id, &[]);
                Ok(())
            })
            .await;
        audited(ENTITY, "delete", result)?;
        info!(id = %id, "User deleted");
        Ok(())
    }

    /// Delete every user. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_all(&self) -> IdentityResult<u64> {
        let result = self
            .store
            .transaction(|t| {
                let removed = t.users.len() as u64;
                t.user_roles.clear();
                t.users.clear();
                Ok(removed)
            })
            .await;
        audited(ENTITY, "delete_all", result)
    }

    /// Number of users.
    pub async fn count(&self) -> u64 {
        self.store.read(|t| t.users.len() as u64).await
    }

    /// Whether a user exists.
    pub async fn exists_by_id(&self, id: &str) -> bool {
        self.store.read(|t| t.users.contains_key(id)).await
    }

    /// Check a raw password against a stored hash.
    #[must_use]
    pub fn verify_password(&self, raw: &str, password_hash: &str) -> bool {
        self.encoder.matches(raw, password_hash)
    }

    /// Validate and hash a password. A blank password records a violation
    /// and yields `None`.
    fn hash_checked(&self, violations: &mut Violations, password: &SecretString) -> IdentityResult<Option<String>> {
        let raw = password.expose_secret();
        check_password(violations, raw);
        if raw.trim().is_empty() {
            return Ok(None);
        }
        self.encoder.encode(raw).map(Some)
    }
}

impl fmt::Debug for UserService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

fn not_found(id: &str) -> IdentityError {
    IdentityError::not_found(format!("User with id: {id} not found"))
}
