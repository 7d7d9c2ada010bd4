//! Token encoding context handed to customizers.

use jsonwebtoken::{Algorithm, Header};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// OAuth2 grant the token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrantType {
    /// `client_credentials`
    ClientCredentials,
    /// `authorization_code`
    AuthorizationCode,
    /// `refresh_token`
    RefreshToken,
    /// Any other grant
    Other(String),
}

impl GrantType {
    /// Wire name of the grant.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        match value {
            "client_credentials" => Self::ClientCredentials,
            "authorization_code" => Self::AuthorizationCode,
            "refresh_token" => Self::RefreshToken,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of token being encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// OAuth2 access token
    AccessToken,
    /// OIDC id token
    IdToken,
    /// Refresh token
    RefreshToken,
}

impl TokenKind {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Authenticated end user behind an authorization-code token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Username (email)
    pub name: String,
    /// Granted authority labels, possibly `ROLE_`-prefixed
    pub authorities: Vec<String>,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub fn new(name: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            authorities,
        }
    }
}

/// Mutable state of a token about to be signed.
#[derive(Debug, Clone)]
pub struct JwtEncodingContext {
    /// Grant type
    pub grant_type: GrantType,
    /// Token kind
    pub token_kind: TokenKind,
    /// End user, absent for client-only grants
    pub principal: Option<Principal>,
    /// Scopes authorized for this request
    pub authorized_scopes: BTreeSet<String>,
    /// JOSE header
    pub header: Header,
    /// Claim set
    pub claims: Map<String, Value>,
}

impl JwtEncodingContext {
    /// Create a context with an RS256 header and an empty claim set.
    #[must_use]
    pub fn new(grant_type: GrantType, token_kind: TokenKind) -> Self {
        Self {
            grant_type,
            token_kind,
            principal: None,
            authorized_scopes: BTreeSet::new(),
            header: Header::new(Algorithm::RS256),
            claims: Map::new(),
        }
    }

    /// Attach the end user.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Set the authorized scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorized_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set a claim.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// String elements of an array claim.
    #[must_use]
    pub fn string_set_claim(&self, name: &str) -> Option<BTreeSet<String>> {
        string_set(self.claims.get(name)?)
    }
}

/// Elements of a JSON string array, or the words of a space-delimited
/// string.
pub(crate) fn string_set(value: &Value) -> Option<BTreeSet<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

/// Sorted JSON array of strings.
pub(crate) fn to_json_array(set: &BTreeSet<String>) -> Value {
    Value::Array(set.iter().cloned().map(Value::String).collect())
}
