//! In-memory identity service double shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    AuthContext, AuthError, AuthMethod, Domain, IdentityClient, Profile, RequestId, Role,
    Scope, TokenMetadata, TokenProject, TokenUser,
};

pub(crate) fn scope(id: &str, enabled: bool) -> Scope {
    Scope {
        id: id.to_string(),
        name: format!("project-{id}"),
        enabled,
        domain_id: Some("default".to_string()),
        description: None,
    }
}

fn domain() -> Domain {
    Domain {
        id: "default".to_string(),
        name: "Default".to_string(),
    }
}

fn alice() -> TokenUser {
    TokenUser {
        id: "u-alice".to_string(),
        name: "alice".to_string(),
        domain: domain(),
    }
}

pub(crate) fn profile(project_id: &str, session_expiry: i64) -> Profile {
    Profile {
        keystone_token: format!("scoped:{project_id}"),
        region: "RegionOne".to_string(),
        project: TokenProject {
            id: project_id.to_string(),
            name: format!("project-{project_id}"),
            domain: domain(),
        },
        user: alice(),
        roles: BTreeSet::new(),
        token_expiry: Utc::now() + Duration::hours(1),
        base_domains: Vec::new(),
        session_expiry,
        session_id: Uuid::new_v4(),
        server_version: crate::SERVER_VERSION.to_string(),
        endpoints: BTreeMap::new(),
        projects: BTreeMap::new(),
        default_project_id: None,
    }
}

/// Identity service knowing one user, alice, with password `wonderland`.
///
/// Scoped tokens are `scoped:{project_id}`; the unscoped token is
/// [`StubIdentity::UNSCOPED_TOKEN`].
pub(crate) struct StubIdentity {
    pub projects: Vec<Scope>,
    pub default_project: Option<String>,
    pub list_user_projects: bool,
    unavailable: AtomicBool,
    revoked: Mutex<Vec<String>>,
    request_ids: Mutex<Vec<Option<String>>>,
}

impl StubIdentity {
    pub const UNSCOPED_TOKEN: &'static str = "unscoped:alice";

    pub fn alice() -> Self {
        Self {
            projects: vec![scope("p1", true), scope("p2", false)],
            default_project: None,
            list_user_projects: true,
            unavailable: AtomicBool::new(false),
            revoked: Mutex::new(Vec::new()),
            request_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn scoped_token(&self, project_id: &str) -> String {
        format!("scoped:{project_id}")
    }

    pub fn revoked_tokens(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }

    /// Request id passed with every call so far, in call order.
    pub fn request_ids(&self) -> Vec<Option<String>> {
        self.request_ids.lock().unwrap().clone()
    }

    pub fn metadata_for(&self, project_id: &str) -> TokenMetadata {
        let project = self
            .projects
            .iter()
            .find(|scope| scope.id == project_id)
            .map(|scope| TokenProject {
                id: scope.id.clone(),
                name: scope.name.clone(),
                domain: domain(),
            });
        TokenMetadata {
            project,
            user: alice(),
            roles: vec![Role {
                id: "r-member".to_string(),
                name: "member".to_string(),
            }],
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn check_available(&self, request_id: Option<&RequestId>) -> Result<(), AuthError> {
        self.request_ids
            .lock()
            .unwrap()
            .push(request_id.map(|id| id.as_str().to_string()));
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::UpstreamUnavailable("connection refused".into()));
        }
        Ok(())
    }

    fn check_token(&self, token: &str) -> Result<Option<String>, AuthError> {
        if token == Self::UNSCOPED_TOKEN {
            return Ok(None);
        }
        match token.strip_prefix("scoped:") {
            Some(project_id) if self.is_authorized(project_id) => {
                Ok(Some(project_id.to_string()))
            },
            _ => Err(AuthError::UpstreamUnauthorized("invalid token".into())),
        }
    }

    fn is_authorized(&self, project_id: &str) -> bool {
        self.projects
            .iter()
            .any(|scope| scope.id == project_id && scope.enabled)
    }

    fn context(&self, token: &str, region: &str, method: AuthMethod) -> AuthContext {
        AuthContext {
            token: token.to_string(),
            user_id: alice().id,
            region: region.to_string(),
            auth_method: method,
            expires_at: None,
        }
    }
}

#[async_trait]
impl IdentityClient for StubIdentity {
    async fn authenticate_password(
        &self,
        region: &str,
        _domain: &str,
        username: &str,
        password: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError> {
        self.check_available(request_id)?;
        if username != "alice" || password != "wonderland" {
            return Err(AuthError::UpstreamUnauthorized("bad credentials".into()));
        }
        Ok(self.context(Self::UNSCOPED_TOKEN, region, AuthMethod::Password))
    }

    async fn authenticate_token(
        &self,
        region: &str,
        token: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError> {
        self.check_available(request_id)?;
        self.check_token(token)?;
        Ok(self.context(token, region, AuthMethod::Token))
    }

    async fn list_scopes(
        &self,
        ctx: &AuthContext,
        only_enabled: bool,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError> {
        self.check_available(request_id)?;
        self.check_token(&ctx.token)?;
        Ok(self
            .projects
            .iter()
            .filter(|scope| scope.enabled || !only_enabled)
            .cloned()
            .collect())
    }

    async fn issue_scoped_token(
        &self,
        token: &str,
        _region: &str,
        project_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<String, AuthError> {
        self.check_available(request_id)?;
        self.check_token(token)?;
        if !self.is_authorized(project_id) {
            return Err(AuthError::UpstreamUnauthorized("project not authorized".into()));
        }
        Ok(self.scoped_token(project_id))
    }

    async fn token_metadata(
        &self,
        token: &str,
        _region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<TokenMetadata, AuthError> {
        self.check_available(request_id)?;
        match self.check_token(token)? {
            Some(project_id) => Ok(self.metadata_for(&project_id)),
            None => Ok(TokenMetadata {
                project: None,
                ..self.metadata_for("")
            }),
        }
    }

    async fn endpoints(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<BTreeMap<String, String>, AuthError> {
        self.check_available(request_id)?;
        self.check_token(token)?;
        Ok(BTreeMap::from([(
            "compute".to_string(),
            format!("http://nova.{region}:8774/v2.1"),
        )]))
    }

    async fn user_default_project(
        &self,
        _token: &str,
        _region: &str,
        _user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Option<String>, AuthError> {
        self.check_available(request_id)?;
        Ok(self.default_project.clone())
    }

    async fn user_projects(
        &self,
        token: &str,
        _region: &str,
        _user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError> {
        self.check_available(request_id)?;
        self.check_token(token)?;
        if !self.list_user_projects {
            return Ok(Vec::new());
        }
        Ok(self.projects.clone())
    }

    async fn revoke_token(
        &self,
        token: &str,
        _region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<(), AuthError> {
        self.check_available(request_id)?;
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
