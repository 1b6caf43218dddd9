//! Keystone v3 identity client.
//!
//! Speaks the Keystone v3 HTTP API with `reqwest`. The caller's own token
//! authenticates every call, so no service credentials are needed.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    AuthContext, AuthError, AuthMethod, IdentityClient, RequestId, Scope, TokenMetadata,
    TokenUser, REQUEST_ID_HEADER,
};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Configuration for the Keystone client.
#[derive(Debug, Clone)]
pub struct KeystoneConfig {
    /// Keystone v3 base URL (e.g., "https://keystone.example.com:5000/v3").
    pub auth_url: String,
    /// Per-region base URL overrides.
    pub regions: HashMap<String, String>,
    /// Endpoint interface to expose from the catalog ("public", "internal"
    /// or "admin").
    pub interface: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:5000/v3".to_string(),
            regions: HashMap::new(),
            interface: "public".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct TokenEnvelope {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    user: TokenUser,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MetadataEnvelope {
    token: TokenMetadata,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    projects: Vec<Scope>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: UserBody,
}

#[derive(Deserialize)]
struct UserBody {
    #[serde(default)]
    default_project_id: Option<String>,
}

#[derive(Deserialize)]
struct CatalogEnvelope {
    catalog: Vec<CatalogService>,
}

/// A service entry of the Keystone catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogService {
    /// Service type (e.g., "compute").
    #[serde(rename = "type")]
    pub service_type: String,
    /// Endpoints of the service.
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// An endpoint of a catalog service.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    /// Interface ("public", "internal", "admin").
    pub interface: String,
    /// Region name (legacy field).
    #[serde(default)]
    pub region: Option<String>,
    /// Region id.
    #[serde(default)]
    pub region_id: Option<String>,
    /// Endpoint URL.
    pub url: String,
}

impl CatalogEndpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

/// Picks one URL per service type for `region` and `interface`.
///
/// The first matching endpoint of a service wins.
pub fn select_endpoints(
    catalog: &[CatalogService],
    region: &str,
    interface: &str,
) -> BTreeMap<String, String> {
    let mut endpoints = BTreeMap::new();
    for service in catalog {
        if let Some(endpoint) = service
            .endpoints
            .iter()
            .find(|e| e.interface == interface && e.in_region(region))
        {
            endpoints
                .entry(service.service_type.clone())
                .or_insert_with(|| endpoint.url.clone());
        }
    }
    endpoints
}

/// Maps an unsuccessful identity-service status to an error.
pub fn status_error(status: StatusCode) -> AuthError {
    if status.is_server_error() {
        AuthError::UpstreamUnavailable(format!("identity service returned {status}"))
    } else {
        AuthError::UpstreamUnauthorized(format!("identity service returned {status}"))
    }
}

fn transport_error(error: reqwest::Error) -> AuthError {
    if error.is_decode() {
        AuthError::UpstreamUnauthorized(format!("unexpected identity response: {error}"))
    } else if error.is_timeout() {
        AuthError::UpstreamUnavailable("identity service timed out".into())
    } else {
        AuthError::UpstreamUnavailable(error.to_string())
    }
}

/// Identity client for Keystone v3.
pub struct KeystoneClient {
    client: Client,
    config: KeystoneConfig,
}

impl KeystoneClient {
    /// Creates a new Keystone client.
    pub fn new(config: KeystoneConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the Keystone base URL serving `region`.
    pub fn auth_url(&self, region: &str) -> &str {
        self.config
            .regions
            .get(region)
            .unwrap_or(&self.config.auth_url)
            .trim_end_matches('/')
    }

    fn url(&self, region: &str, path: &str) -> String {
        format!("{}{}", self.auth_url(region), path)
    }

    async fn send(
        request: RequestBuilder,
        request_id: Option<&RequestId>,
    ) -> Result<Response, AuthError> {
        let request = match request_id {
            Some(id) => request.header(REQUEST_ID_HEADER, id.as_str()),
            None => request,
        };
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!(
                status = %status,
                url = %response.url(),
                request_id = request_id.map(RequestId::as_str),
                "Identity service rejected request"
            );
            return Err(status_error(status));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        region: &str,
        path: &str,
        request_id: Option<&RequestId>,
    ) -> Result<T, AuthError> {
        let request = self
            .client
            .get(self.url(region, path))
            .header(AUTH_TOKEN_HEADER, token);
        Self::send(request, request_id)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }

    /// Posts an authentication body and returns the issued token with the
    /// token body.
    async fn issue(
        &self,
        region: &str,
        body: serde_json::Value,
        request_id: Option<&RequestId>,
    ) -> Result<(String, TokenBody), AuthError> {
        let request = self.client.post(self.url(region, "/auth/tokens")).json(&body);
        let response = Self::send(request, request_id).await?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AuthError::UpstreamUnauthorized("missing X-Subject-Token header".into())
            })?;
        let envelope: TokenEnvelope = response.json().await.map_err(transport_error)?;

        Ok((token, envelope.token))
    }

    async fn unscoped(
        &self,
        region: &str,
        body: serde_json::Value,
        auth_method: AuthMethod,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError> {
        let (token, body) = self.issue(region, body, request_id).await?;
        Ok(AuthContext {
            token,
            user_id: body.user.id,
            region: region.to_string(),
            auth_method,
            expires_at: Some(body.expires_at),
        })
    }
}

#[async_trait]
impl IdentityClient for KeystoneClient {
    async fn authenticate_password(
        &self,
        region: &str,
        domain: &str,
        username: &str,
        password: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": username,
                            "domain": { "name": domain },
                            "password": password,
                        }
                    }
                }
            }
        });
        self.unscoped(region, body, AuthMethod::Password, request_id)
            .await
    }

    async fn authenticate_token(
        &self,
        region: &str,
        token: &str,
        request_id: Option<&RequestId>,
    ) -> Result<AuthContext, AuthError> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["token"],
                    "token": { "id": token }
                }
            }
        });
        self.unscoped(region, body, AuthMethod::Token, request_id)
            .await
    }

    async fn list_scopes(
        &self,
        ctx: &AuthContext,
        only_enabled: bool,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError> {
        let envelope: ProjectsEnvelope = self
            .get_json(&ctx.token, &ctx.region, "/auth/projects", request_id)
            .await?;
        Ok(envelope
            .projects
            .into_iter()
            .filter(|scope| scope.enabled || !only_enabled)
            .collect())
    }

    async fn issue_scoped_token(
        &self,
        token: &str,
        region: &str,
        project_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<String, AuthError> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["token"],
                    "token": { "id": token }
                },
                "scope": {
                    "project": { "id": project_id }
                }
            }
        });
        let (token, _) = self.issue(region, body, request_id).await?;
        Ok(token)
    }

    async fn token_metadata(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<TokenMetadata, AuthError> {
        let request = self
            .client
            .get(self.url(region, "/auth/tokens?nocatalog"))
            .header(AUTH_TOKEN_HEADER, token)
            .header(SUBJECT_TOKEN_HEADER, token);
        let envelope: MetadataEnvelope = Self::send(request, request_id)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(envelope.token)
    }

    async fn endpoints(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let envelope: CatalogEnvelope = self
            .get_json(token, region, "/auth/catalog", request_id)
            .await?;
        Ok(select_endpoints(
            &envelope.catalog,
            region,
            &self.config.interface,
        ))
    }

    async fn user_default_project(
        &self,
        token: &str,
        region: &str,
        user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Option<String>, AuthError> {
        let envelope: UserEnvelope = self
            .get_json(token, region, &format!("/users/{user_id}"), request_id)
            .await?;
        Ok(envelope.user.default_project_id)
    }

    async fn user_projects(
        &self,
        token: &str,
        region: &str,
        user_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<Vec<Scope>, AuthError> {
        let envelope: ProjectsEnvelope = self
            .get_json(
                token,
                region,
                &format!("/users/{user_id}/projects"),
                request_id,
            )
            .await?;
        Ok(envelope.projects)
    }

    async fn revoke_token(
        &self,
        token: &str,
        region: &str,
        request_id: Option<&RequestId>,
    ) -> Result<(), AuthError> {
        let request = self
            .client
            .delete(self.url(region, "/auth/tokens"))
            .header(AUTH_TOKEN_HEADER, token)
            .header(SUBJECT_TOKEN_HEADER, token);
        Self::send(request, request_id).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "keystone"
    }
}
