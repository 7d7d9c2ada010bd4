//! Field rules and violation aggregation.

use crate::error::{IdentityError, IdentityResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Label is whitespace only.
pub const LABEL_NOT_BLANK: &str = "label must not be blank";
/// Label is the empty string.
pub const LABEL_NOT_EMPTY: &str = "label must not be empty";
/// Label collides with another privilege or role.
pub const LABEL_UNIQUE: &str = "label must be unique";
/// Email is whitespace only.
pub const EMAIL_NOT_BLANK: &str = "email must not be blank";
/// Email is the empty string.
pub const EMAIL_NOT_EMPTY: &str = "email must not be empty";
/// Email is not an address.
pub const EMAIL_NOT_VALID: &str = "email not valid";
/// Email collides with another user.
pub const EMAIL_UNIQUE: &str = "email must be unique";
/// Password is blank.
pub const PASSWORD_NOT_BLANK: &str = "password must not be blank or empty";
/// Role would have no privileges.
pub const PRIVILEGES_NOT_EMPTY: &str = "privileges must not be empty";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+$").expect("Failed to compile email pattern")
});

/// Collected rule violations, de-duplicated and sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Violations(BTreeSet<&'static str>);

impl Violations {
    /// Empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation.
    pub fn add(&mut self, rule: &'static str) {
        self.0.insert(rule);
    }

    /// Record `rule` when `violated` holds.
    pub fn check(&mut self, violated: bool, rule: &'static str) {
        if violated {
            self.add(rule);
        }
    }

    /// No violations recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted messages joined with `". "`.
    #[must_use]
    pub fn message(&self) -> String {
        self.0.iter().copied().collect::<Vec<_>>().join(". ")
    }

    /// `Ok` when empty, otherwise one aggregated constraint violation.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::ConstraintViolation`] carrying every rule.
    pub fn into_result(self) -> IdentityResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(IdentityError::constraint(self.message()))
        }
    }
}

/// Lowercased label as stored.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase()
}

/// Blank and empty checks for a label.
pub fn check_label(violations: &mut Violations, label: &str) {
    violations.check(label.is_empty(), LABEL_NOT_EMPTY);
    violations.check(label.trim().is_empty(), LABEL_NOT_BLANK);
}

/// Blank, empty and format checks for an email.
pub fn check_email(violations: &mut Violations, email: &str) {
    violations.check(email.is_empty(), EMAIL_NOT_EMPTY);
    violations.check(email.trim().is_empty(), EMAIL_NOT_BLANK);
    violations.check(!email.is_empty() && !is_valid_email(email), EMAIL_NOT_VALID);
}

/// Blank check for a raw password.
pub fn check_password(violations: &mut Violations, password: &str) {
    violations.check(password.trim().is_empty(), PASSWORD_NOT_BLANK);
}

/// Whether `email` looks like an address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_label_reports_both_rules_sorted() {
        let mut v = Violations::new();
        check_label(&mut v, "");
        assert_eq!(v.message(), "label must not be blank. label must not be empty");
    }

    #[test]
    fn test_blank_label() {
        let mut v = Violations::new();
        check_label(&mut v, "   ");
        assert_eq!(v.message(), LABEL_NOT_BLANK);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut v = Violations::new();
        v.add(LABEL_UNIQUE);
        v.add(LABEL_UNIQUE);
        v.add(EMAIL_UNIQUE);
        assert_eq!(v.message(), "email must be unique. label must be unique");
    }

    #[test]
    fn test_email_rules() {
        let mut v = Violations::new();
        check_email(&mut v, "");
        assert_eq!(v.message(), "email must not be blank. email must not be empty");

        let mut v = Violations::new();
        check_email(&mut v, "not-an-email");
        assert_eq!(v.message(), EMAIL_NOT_VALID);

        let mut v = Violations::new();
        check_email(&mut v, "admin@example.com");
        assert!(v.is_empty());
    }

    #[test]
    fn test_into_result() {
        assert!(Violations::new().into_result().is_ok());

        let mut v = Violations::new();
        v.add(PRIVILEGES_NOT_EMPTY);
        let err = v.into_result().unwrap_err();
        assert!(matches!(err, IdentityError::ConstraintViolation(ref m) if m == PRIVILEGES_NOT_EMPTY));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("ReAd"), "read");
    }
}
