//! Authentication error types.

use keygate_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while establishing or reading a session.
///
/// Every variant is an authentication failure from the caller's point of
/// view; the HTTP layer answers all of them with the same 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity service rejected the credential, token or scope, or
    /// answered with something unusable.
    #[error("identity service rejected the request: {0}")]
    UpstreamUnauthorized(String),

    /// The user has no enabled project to scope a token to.
    #[error("you are not authorized for any projects or domains")]
    NoAuthorizedScopes,

    /// The identity service could not be reached or timed out.
    #[error("identity service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Session token is malformed or signed with another key.
    #[error("invalid session token")]
    InvalidSignature,

    /// Session token is past its expiry.
    #[error("session expired")]
    Expired,

    /// Session was logged out.
    #[error("session revoked")]
    Revoked,

    /// No session token was presented.
    #[error("missing session token")]
    MissingToken,

    /// Signing configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Revocation store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Returns a stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UpstreamUnauthorized(_) => "upstream_unauthorized",
            Self::NoAuthorizedScopes => "no_authorized_scopes",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::MissingToken => "missing_token",
            Self::Configuration(_) => "configuration",
            Self::Storage(_) => "storage",
        }
    }
}
