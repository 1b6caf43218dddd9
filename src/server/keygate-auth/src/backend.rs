//! Identity service client trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{AuthContext, AuthError, RequestId, Scope, TokenMetadata};

/// Trait for identity service clients.
///
/// Every call is a single request to the identity service: no caching and
/// no retries. Rejections surface as [`AuthError::UpstreamUnauthorized`],
/// transport failures and timeouts as [`AuthError::UpstreamUnavailable`].
///
/// Each call takes the caller's request id, if any, and forwards it
/// upstream.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Authenticates with a password and returns an unscoped context.
    async fn authenticate_password(
        &self,
        region: &str,
        domain: &str,
        username: &str,
        password: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError>;

    /// Authenticates with an existing token and returns an unscoped context.
    async fn authenticate_token(
        &self,
        region: &str,
        token: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError>;

    /// Lists the projects the authenticated user may scope to.
    ///
    /// With `only_enabled`, disabled projects are filtered out. The order is
    /// whatever the identity service returns.
    async fn list_scopes(
        &self,
        ctx: &AuthContext,
        only_enabled: bool,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError>;

    /// Exchanges `token` for a token scoped to `project_id`.
    async fn issue_scoped_token(
        &self,
        token: &str,
        region: &str,
        project_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<String, AuthError>;

    /// Fetches project, user, roles and expiry of `token`.
    async fn token_metadata(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<TokenMetadata, AuthError>;

    /// Returns the endpoint catalog of `region` as service type to URL.
    async fn endpoints(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<BTreeMap<String, String>, AuthError>;

    /// Returns the default project id recorded on the user account.
    async fn user_default_project(
        &self,
        token: &str,
        region: &str,
        user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Option<String>, AuthError>;

    /// Lists the projects the user has a role assignment on.
    async fn user_projects(
        &self,
        token: &str,
        region: &str,
        user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError>;

    /// Revokes `token` at the identity service.
    async fn revoke_token(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<(), AuthError>;

    /// Returns the name of this client for logging/debugging.
    fn name(&self) -> &'static str;
}
