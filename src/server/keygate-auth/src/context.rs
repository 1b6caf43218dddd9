//! Authentication context and identity-service data types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Method used to obtain the unscoped token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Username and password.
    Password,
    /// Existing keystone token (credential token or WebSSO federation token).
    Token,
}

/// Login credential supplied with a request.
///
/// Deserializes from either `{region, username, password, domain?}` or
/// `{region, token}`.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    /// Password credential.
    Password {
        /// Region to log into.
        region: String,
        /// User name.
        username: String,
        /// Password.
        password: String,
        /// User domain name; the configured default domain when absent.
        #[serde(default)]
        domain: Option<String>,
    },
    /// Token credential.
    Token {
        /// Region to log into.
        region: String,
        /// Unscoped or federation token.
        token: String,
    },
}

impl Credential {
    /// Returns the region this credential targets.
    pub fn region(&self) -> &str {
        match self {
            Self::Password { region, .. } | Self::Token { region, .. } => region,
        }
    }

    /// Returns the authentication method this credential uses.
    pub fn method(&self) -> AuthMethod {
        match self {
            Self::Password { .. } => AuthMethod::Password,
            Self::Token { .. } => AuthMethod::Token,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password {
                region,
                username,
                domain,
                ..
            } => f
                .debug_struct("Password")
                .field("region", region)
                .field("username", username)
                .field("domain", domain)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token { region, .. } => f
                .debug_struct("Token")
                .field("region", region)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Result of an unscoped authentication against the identity service.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Unscoped token.
    pub token: String,

    /// Authenticated user id.
    pub user_id: String,

    /// Region the token was obtained in.
    pub region: String,

    /// Authentication method used.
    pub auth_method: AuthMethod,

    /// Token expiration, when the identity service reported one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("region", &self.region)
            .field("auth_method", &self.auth_method)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// An authorization unit (project) a user may scope a token to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Whether the project is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Owning domain id.
    #[serde(default)]
    pub domain_id: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A domain reference as embedded in token data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain id.
    pub id: String,
    /// Domain name.
    #[serde(default)]
    pub name: String,
}

/// The project a token is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenProject {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Project domain.
    pub domain: Domain,
}

/// The user a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    /// User id.
    pub id: String,
    /// User name.
    pub name: String,
    /// User domain.
    pub domain: Domain,
}

/// A role granted on the token's scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Role id.
    pub id: String,
    /// Role name.
    pub name: String,
}

/// Token metadata as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Scoped project; `None` for unscoped tokens.
    #[serde(default)]
    pub project: Option<TokenProject>,
    /// Token owner.
    pub user: TokenUser,
    /// Roles on the scoped project.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Token expiration.
    pub expires_at: DateTime<Utc>,
}
