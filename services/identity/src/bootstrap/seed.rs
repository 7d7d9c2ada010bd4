//! Seed document for first-start RBAC data.

use crate::error::{IdentityError, IdentityResult};
use serde::Deserialize;
use std::path::Path;

/// Privileges, roles and users created on first start.
///
/// Roles reference privileges and users reference roles by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedConfig {
    /// Privileges to create
    pub privileges: Vec<SeedPrivilege>,
    /// Roles to create
    pub roles: Vec<SeedRole>,
    /// Users to create
    pub users: Vec<SeedUser>,
}

/// Seed privilege.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPrivilege {
    /// Label
    pub label: String,
    /// Default flag
    #[serde(default)]
    pub is_default: bool,
}

/// Seed role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRole {
    /// Label
    pub label: String,
    /// Default flag
    #[serde(default)]
    pub is_default: bool,
    /// Labels of seed privileges to attach
    #[serde(default)]
    pub privileges: Vec<String>,
}

/// Seed user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    /// Email
    pub email: String,
    /// Password; generated when missing or blank
    #[serde(default)]
    pub password: Option<String>,
    /// Labels of seed roles to attach
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SeedConfig {
    /// Parse a JSON seed document.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Config`] on malformed JSON.
    pub fn from_json(json: &str) -> IdentityResult<Self> {
        serde_json::from_str(json).map_err(|e| IdentityError::config(format!("invalid seed document: {e}")))
    }

    /// Read and parse a JSON seed file.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Config`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: impl AsRef<Path>) -> IdentityResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IdentityError::config(format!("cannot read seed file {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Whether the document seeds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty() && self.roles.is_empty() && self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_document() {
        let seed = SeedConfig::from_json(
            r#"{
                "privileges": [{"label": "read", "isDefault": true}, {"label": "write"}],
                "roles": [{"label": "admin", "privileges": ["write"]}],
                "users": [{"email": "admin@mail.com", "roles": ["admin"]}]
            }"#,
        )
        .unwrap();

        assert_eq!(seed.privileges.len(), 2);
        assert!(seed.privileges[0].is_default);
        assert!(!seed.privileges[1].is_default);
        assert_eq!(seed.roles[0].privileges, vec!["write"]);
        assert_eq!(seed.users[0].password, None);
        assert!(!seed.is_empty());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        assert!(SeedConfig::from_json("{}").unwrap().is_empty());
        assert!(matches!(
            SeedConfig::from_json("not json"),
            Err(IdentityError::Config(_))
        ));
        assert!(SeedConfig::from_file("/nonexistent/seed.json").is_err());
    }
}
