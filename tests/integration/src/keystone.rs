//! In-process Keystone v3 stand-in.
//!
//! Serves the handful of identity calls the gateway makes, backed by a
//! fixed set of users and projects.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Region every fixture lives in.
pub const REGION: &str = "RegionOne";

/// A fixture user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: &'static str,
    pub name: &'static str,
    pub password: &'static str,
    pub default_project_id: Option<&'static str>,
    pub project_ids: Vec<&'static str>,
}

/// A fixture project.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: &'static str,
    pub name: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    user_id: &'static str,
    project_id: Option<&'static str>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    projects: Vec<Project>,
    tokens: Mutex<HashMap<String, IssuedToken>>,
    revoked: Mutex<Vec<String>>,
    request_ids: Mutex<Vec<Option<String>>>,
    counter: AtomicU64,
}

/// Users and projects served by the fake.
///
/// - `alice` / `wonderland`: projects `p1`, `p2` and the disabled `p3`,
///   default project `p2`
/// - `nobody` / `nothing`: no projects
#[derive(Clone)]
pub struct KeystoneState {
    inner: Arc<Inner>,
}

impl Default for KeystoneState {
    fn default() -> Self {
        let users = vec![
            User {
                id: "u-alice",
                name: "alice",
                password: "wonderland",
                default_project_id: Some("p2"),
                project_ids: vec!["p1", "p2", "p3"],
            },
            User {
                id: "u-nobody",
                name: "nobody",
                password: "nothing",
                default_project_id: None,
                project_ids: Vec::new(),
            },
        ];
        let projects = vec![
            Project {
                id: "p1",
                name: "demo",
                enabled: true,
            },
            Project {
                id: "p2",
                name: "admin",
                enabled: true,
            },
            Project {
                id: "p3",
                name: "archived",
                enabled: false,
            },
        ];

        Self {
            inner: Arc::new(Inner {
                users,
                projects,
                ..Inner::default()
            }),
        }
    }
}

impl KeystoneState {
    /// Issues an unscoped token for `username` without going through HTTP.
    pub fn unscoped_token(&self, username: &str) -> Option<String> {
        let user = self.user_by_name(username)?;
        Some(self.issue(user.id, None))
    }

    /// Tokens revoked so far.
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.inner
            .revoked
            .lock()
            .map(|revoked| revoked.clone())
            .unwrap_or_default()
    }

    /// `X-Openstack-Request-Id` of every request received, in order.
    pub fn request_ids(&self) -> Vec<Option<String>> {
        self.inner
            .request_ids
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Whether `token` is currently valid.
    pub fn is_valid(&self, token: &str) -> bool {
        self.lookup(token).is_some()
    }

    fn user_by_name(&self, name: &str) -> Option<&User> {
        self.inner.users.iter().find(|u| u.name == name)
    }

    fn user_by_id(&self, id: &str) -> Option<&User> {
        self.inner.users.iter().find(|u| u.id == id)
    }

    fn project(&self, id: &str) -> Option<&Project> {
        self.inner.projects.iter().find(|p| p.id == id)
    }

    fn issue(&self, user_id: &'static str, project_id: Option<&'static str>) -> String {
        let n = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        let token = format!("gAAAA-fake-{n}");
        if let Ok(mut tokens) = self.inner.tokens.lock() {
            tokens.insert(
                token.clone(),
                IssuedToken {
                    user_id,
                    project_id,
                },
            );
        }
        token
    }

    fn lookup(&self, token: &str) -> Option<IssuedToken> {
        self.inner.tokens.lock().ok()?.get(token).cloned()
    }

    fn revoke(&self, token: &str) -> bool {
        let removed = self
            .inner
            .tokens
            .lock()
            .map(|mut tokens| tokens.remove(token).is_some())
            .unwrap_or(false);
        if removed {
            if let Ok(mut revoked) = self.inner.revoked.lock() {
                revoked.push(token.to_string());
            }
        }
        removed
    }

    fn projects_of(&self, user: &User) -> Vec<Value> {
        user.project_ids
            .iter()
            .filter_map(|id| self.project(id))
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "enabled": p.enabled,
                    "domain_id": "default",
                    "description": format!("{} project", p.name),
                })
            })
            .collect()
    }

    fn token_body(&self, issued: &IssuedToken) -> Value {
        let domain = json!({"id": "default", "name": "Default"});
        let user = self.user_by_id(issued.user_id);
        let mut body = json!({
            "user": {
                "id": issued.user_id,
                "name": user.map(|u| u.name).unwrap_or_default(),
                "domain": domain,
            },
            "expires_at": (Utc::now() + Duration::hours(1))
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        if let Some(project) = issued.project_id.and_then(|id| self.project(id)) {
            body["project"] = json!({"id": project.id, "name": project.name, "domain": domain});
            body["roles"] = json!([{"id": "r-member", "name": "member"}]);
        }
        json!({ "token": body })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl KeystoneState {
    fn caller(&self, headers: &HeaderMap) -> Option<IssuedToken> {
        header(headers, "X-Auth-Token").and_then(|token| self.lookup(token))
    }
}

async fn record_request_id(
    State(state): State<KeystoneState>,
    request: Request,
    next: Next,
) -> Response {
    let id = header(request.headers(), "X-Openstack-Request-Id").map(str::to_string);
    if let Ok(mut ids) = state.inner.request_ids.lock() {
        ids.push(id);
    }
    next.run(request).await
}

async fn create_token(State(state): State<KeystoneState>, Json(body): Json<Value>) -> Response {
    let identity = &body["auth"]["identity"];
    let user_id = match identity["methods"][0].as_str() {
        Some("password") => {
            let user = &identity["password"]["user"];
            match state.user_by_name(user["name"].as_str().unwrap_or_default()) {
                Some(found) if Some(found.password) == user["password"].as_str() => found.id,
                _ => return StatusCode::UNAUTHORIZED.into_response(),
            }
        },
        Some("token") => {
            match state.lookup(identity["token"]["id"].as_str().unwrap_or_default()) {
                Some(issued) => issued.user_id,
                None => return StatusCode::UNAUTHORIZED.into_response(),
            }
        },
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let project_id = match body["auth"]["scope"]["project"]["id"].as_str() {
        Some(id) => {
            let allowed = state
                .user_by_id(user_id)
                .and_then(|user| user.project_ids.iter().copied().find(|p| *p == id))
                .filter(|p| state.project(p).is_some_and(|project| project.enabled));
            match allowed {
                Some(project_id) => Some(project_id),
                None => return StatusCode::UNAUTHORIZED.into_response(),
            }
        },
        None => None,
    };

    let token = state.issue(user_id, project_id);
    let issued = IssuedToken {
        user_id,
        project_id,
    };
    let body = state.token_body(&issued);

    (
        StatusCode::CREATED,
        [("X-Subject-Token", token)],
        Json(body),
    )
        .into_response()
}

async fn validate_token(State(state): State<KeystoneState>, headers: HeaderMap) -> Response {
    if state.caller(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match header(&headers, "X-Subject-Token").and_then(|token| state.lookup(token)) {
        Some(issued) => Json(state.token_body(&issued)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn revoke_token(State(state): State<KeystoneState>, headers: HeaderMap) -> StatusCode {
    if state.caller(&headers).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    match header(&headers, "X-Subject-Token") {
        Some(token) if state.revoke(token) => StatusCode::NO_CONTENT,
        _ => StatusCode::NOT_FOUND,
    }
}

async fn auth_projects(State(state): State<KeystoneState>, headers: HeaderMap) -> Response {
    match state
        .caller(&headers)
        .and_then(|issued| state.user_by_id(issued.user_id))
    {
        Some(user) => Json(json!({ "projects": state.projects_of(user) })).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn auth_catalog(State(state): State<KeystoneState>, headers: HeaderMap) -> Response {
    if state.caller(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "catalog": [
            {
                "type": "compute",
                "endpoints": [
                    {"interface": "public", "region_id": REGION, "url": "http://nova:8774/v2.1"},
                    {"interface": "internal", "region_id": REGION, "url": "http://nova-int:8774/v2.1"}
                ]
            },
            {
                "type": "identity",
                "endpoints": [
                    {"interface": "public", "region_id": REGION, "url": "http://keystone:5000/v3"}
                ]
            }
        ]
    }))
    .into_response()
}

async fn get_user(
    State(state): State<KeystoneState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if state.caller(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.user_by_id(&user_id) {
        Some(user) => Json(json!({
            "user": {
                "id": user.id,
                "name": user.name,
                "default_project_id": user.default_project_id,
            }
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn user_projects(
    State(state): State<KeystoneState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if state.caller(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.user_by_id(&user_id) {
        Some(user) => Json(json!({ "projects": state.projects_of(user) })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Keystone router, mounted under `/v3`.
pub fn router(state: KeystoneState) -> Router {
    let v3 = Router::new()
        .route(
            "/auth/tokens",
            get(validate_token).post(create_token).delete(revoke_token),
        )
        .route("/auth/projects", get(auth_projects))
        .route("/auth/catalog", get(auth_catalog))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/projects", get(user_projects))
        .layer(middleware::from_fn_with_state(state.clone(), record_request_id))
        .with_state(state);

    Router::new().nest("/v3", v3)
}

/// Serves `app` on an ephemeral loopback port.
pub async fn serve(app: Router) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind loopback listener")?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, handle))
}

/// A running fake Keystone.
pub struct FakeKeystone {
    pub state: KeystoneState,
    pub auth_url: String,
    handle: JoinHandle<()>,
}

impl FakeKeystone {
    /// Starts a fake with the default fixtures.
    pub async fn start() -> Result<Self> {
        let state = KeystoneState::default();
        let (addr, handle) = serve(router(state.clone())).await?;
        Ok(Self {
            state,
            auth_url: format!("http://{addr}/v3"),
            handle,
        })
    }

    /// Starts a Keystone that answers every request with 503.
    pub async fn start_unavailable() -> Result<Self> {
        let app = Router::new().fallback(|| async { StatusCode::SERVICE_UNAVAILABLE });
        let (addr, handle) = serve(app).await?;
        Ok(Self {
            state: KeystoneState::default(),
            auth_url: format!("http://{addr}/v3"),
            handle,
        })
    }

    /// Starts a Keystone that holds every request for `delay` before
    /// answering 503.
    pub async fn start_slow(delay: StdDuration) -> Result<Self> {
        let app = Router::new().fallback(move || async move {
            tokio::time::sleep(delay).await;
            StatusCode::SERVICE_UNAVAILABLE
        });
        let (addr, handle) = serve(app).await?;
        Ok(Self {
            state: KeystoneState::default(),
            auth_url: format!("http://{addr}/v3"),
            handle,
        })
    }
}

impl Drop for FakeKeystone {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
