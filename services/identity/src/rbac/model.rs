//! RBAC entities, commands and read models.

use crate::time::format_instant;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Named permission atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    /// Id
    pub id: String,
    /// Lowercase unique label
    pub label: String,
    /// Granted to every role automatically
    pub is_default: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Named bundle of privileges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Id
    pub id: String,
    /// Lowercase unique label
    pub label: String,
    /// Granted to every user automatically
    pub is_default: bool,
    /// Attached privileges, ordered by label
    pub privileges: Vec<Privilege>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Account holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Id
    pub id: String,
    /// Unique email
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// Attached roles, ordered by label
    pub roles: Vec<Role>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Privilege creation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrivilege {
    /// Label, lowercased on save
    pub label: String,
    /// Default flag
    #[serde(default)]
    pub is_default: bool,
}

impl NewPrivilege {
    /// Create a request.
    #[must_use]
    pub fn new(label: impl Into<String>, is_default: bool) -> Self {
        Self {
            label: label.into(),
            is_default,
        }
    }
}

/// Privilege update request.
pub type PrivilegeUpdate = NewPrivilege;

/// Role creation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    /// Label, lowercased on save
    pub label: String,
    /// Default flag
    #[serde(default)]
    pub is_default: bool,
    /// Requested privilege ids; unknown ids are ignored
    #[serde(default)]
    pub privileges: Option<Vec<String>>,
}

impl NewRole {
    /// Create a request.
    #[must_use]
    pub fn new(label: impl Into<String>, is_default: bool, privileges: Option<Vec<String>>) -> Self {
        Self {
            label: label.into(),
            is_default,
            privileges,
        }
    }
}

/// Role update request. The privilege set is replaced by the known ids
/// among `privileges`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    /// New label
    pub label: String,
    /// New default flag
    #[serde(default)]
    pub is_default: bool,
    /// Replacement privilege ids
    #[serde(default)]
    pub privileges: Vec<String>,
}

/// User creation request.
#[derive(Debug)]
pub struct NewUser {
    /// Email
    pub email: String,
    /// Raw password, hashed before storage
    pub password: SecretString,
    /// Requested role ids; unknown ids are ignored
    pub roles: Option<Vec<String>>,
}

impl NewUser {
    /// Create a request.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>, roles: Option<Vec<String>>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
            roles,
        }
    }
}

/// User update request. The role set is replaced by the known ids among
/// `roles`.
#[derive(Debug)]
pub struct UserUpdate {
    /// New email
    pub email: String,
    /// New raw password
    pub password: SecretString,
    /// Replacement role ids
    pub roles: Vec<String>,
}

impl UserUpdate {
    /// Create a request.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
            roles,
        }
    }
}

/// Serialized privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegeView {
    /// Id
    pub id: String,
    /// Label
    pub label: String,
    /// Default flag
    pub is_default: bool,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 update time
    pub updated_at: String,
}

impl From<&Privilege> for PrivilegeView {
    fn from(p: &Privilege) -> Self {
        Self {
            id: p.id.clone(),
            label: p.label.clone(),
            is_default: p.is_default,
            created_at: format_instant(&p.created_at),
            updated_at: format_instant(&p.updated_at),
        }
    }
}

/// Serialized role with its privileges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    /// Id
    pub id: String,
    /// Label
    pub label: String,
    /// Default flag
    pub is_default: bool,
    /// Privileges
    pub privileges: Vec<PrivilegeView>,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 update time
    pub updated_at: String,
}

impl From<&Role> for RoleView {
    fn from(r: &Role) -> Self {
        Self {
            id: r.id.clone(),
            label: r.label.clone(),
            is_default: r.is_default,
            privileges: r.privileges.iter().map(PrivilegeView::from).collect(),
            created_at: format_instant(&r.created_at),
            updated_at: format_instant(&r.updated_at),
        }
    }
}

/// Serialized user with its roles. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// Id
    pub id: String,
    /// Email
    pub email: String,
    /// Roles
    pub roles: Vec<RoleView>,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 update time
    pub updated_at: String,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            roles: u.roles.iter().map(RoleView::from).collect(),
            created_at: format_instant(&u.created_at),
            updated_at: format_instant(&u.updated_at),
        }
    }
}
