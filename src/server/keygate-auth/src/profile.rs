//! Session profiles and their construction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuthError, AuthSettings, IdentityClient, Payload, RequestId, Role, Scope, TokenMetadata,
    TokenProject, TokenUser,
};

/// Server version reported in every profile.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Summary of a project the user may switch to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name.
    pub name: String,
    /// Whether the project is enabled.
    pub enabled: bool,
    /// Owning domain id.
    pub domain_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

impl From<Scope> for ProjectInfo {
    fn from(scope: Scope) -> Self {
        Self {
            name: scope.name,
            enabled: scope.enabled,
            domain_id: scope.domain_id,
            description: scope.description,
        }
    }
}

/// Authenticated session state returned to the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Project-scoped keystone token.
    pub keystone_token: String,
    /// Region the session belongs to.
    pub region: String,
    /// Project the token is scoped to.
    pub project: TokenProject,
    /// Token owner.
    pub user: TokenUser,
    /// Roles on the scoped project.
    pub roles: BTreeSet<Role>,
    /// Keystone token expiry.
    #[serde(rename = "keystone_token_exp")]
    pub token_expiry: DateTime<Utc>,
    /// Base domains from configuration.
    pub base_domains: Vec<String>,
    /// Session expiry (Unix seconds).
    #[serde(rename = "exp")]
    pub session_expiry: i64,
    /// Session id, stable across project switches.
    #[serde(rename = "uuid")]
    pub session_id: Uuid,
    /// Server version.
    #[serde(rename = "version")]
    pub server_version: String,
    /// Endpoint catalog of the region: service type to URL.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Enabled projects of the user, keyed by id.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectInfo>,
    /// Default project of the user, always a key of `projects` when set.
    #[serde(default)]
    pub default_project_id: Option<String>,
}

impl Profile {
    /// Replaces the project list with the enabled entries of `scopes`.
    pub fn set_projects(&mut self, scopes: Vec<Scope>) {
        self.projects = scopes
            .into_iter()
            .filter(|scope| scope.enabled)
            .map(|scope| (scope.id.clone(), ProjectInfo::from(scope)))
            .collect();
    }

    /// Sets the default project, dropping it when it is not one of
    /// `projects`.
    pub fn set_default_project(&mut self, project_id: Option<String>) {
        self.default_project_id = project_id.filter(|id| self.projects.contains_key(id));
    }

    /// Session claims of this profile.
    pub fn payload(&self) -> Payload {
        Payload::from(self)
    }
}

/// Input of [`ProfileBuilder::build`].
#[derive(Debug, Clone)]
pub struct ProfileRequest {
    keystone_token: String,
    region: String,
    metadata: Option<TokenMetadata>,
    session_id: Option<Uuid>,
    expiry: Option<i64>,
    request_id: Option<RequestId>,
}

impl ProfileRequest {
    /// Creates a request for a fresh session.
    pub fn new(keystone_token: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            keystone_token: keystone_token.into(),
            region: region.into(),
            metadata: None,
            session_id: None,
            expiry: None,
            request_id: None,
        }
    }

    /// Creates a request rebuilding the session described by `payload`,
    /// keeping its id and expiry.
    pub fn from_payload(payload: &Payload) -> Self {
        Self::new(payload.keystone_token.clone(), payload.region.clone())
            .with_session_id(payload.uuid)
            .with_expiry(payload.exp)
    }

    /// Uses already fetched token metadata instead of asking the identity
    /// service.
    pub fn with_metadata(mut self, metadata: TokenMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Keeps an existing session id.
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Keeps an existing session expiry.
    pub fn with_expiry(mut self, expiry: i64) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Forwards the caller's request id to the identity service.
    pub fn with_request_id(mut self, request_id: Option<RequestId>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Drops a previously set expiry so a fresh one is computed.
    pub fn with_fresh_expiry(mut self) -> Self {
        self.expiry = None;
        self
    }
}

/// Assembles profiles from token metadata and configuration.
pub struct ProfileBuilder {
    identity: Arc<dyn IdentityClient>,
    settings: Arc<AuthSettings>,
}

impl ProfileBuilder {
    /// Creates a builder.
    pub fn new(identity: Arc<dyn IdentityClient>, settings: Arc<AuthSettings>) -> Self {
        Self { identity, settings }
    }

    /// Builds a profile without enrichment data.
    ///
    /// # Errors
    ///
    /// Fails with [`AuthError::UpstreamUnauthorized`] when the identity
    /// service rejects the token or the token is not project scoped.
    pub async fn build(&self, request: ProfileRequest) -> Result<Profile, AuthError> {
        let metadata = match request.metadata {
            Some(metadata) => metadata,
            None => {
                self.identity
                    .token_metadata(
                        &request.keystone_token,
                        &request.region,
                        request.request_id.as_ref(),
                    )
                    .await?
            },
        };

        let project = metadata.project.ok_or_else(|| {
            AuthError::UpstreamUnauthorized("token is not scoped to a project".into())
        })?;

        let session_expiry = request
            .expiry
            .unwrap_or_else(|| crate::unix_now() + self.settings.session_ttl_secs);
        let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);

        debug!(
            region = %request.region,
            user_id = %metadata.user.id,
            project_id = %project.id,
            session_id = %session_id,
            request_id = request.request_id.as_ref().map(RequestId::as_str),
            "Built session profile"
        );

        Ok(Profile {
            keystone_token: request.keystone_token,
            region: request.region,
            project,
            user: metadata.user,
            roles: metadata.roles.into_iter().collect(),
            token_expiry: metadata.expires_at,
            base_domains: self.settings.base_domains.clone(),
            session_expiry,
            session_id,
            server_version: SERVER_VERSION.to_string(),
            endpoints: BTreeMap::new(),
            projects: BTreeMap::new(),
            default_project_id: None,
        })
    }
}
