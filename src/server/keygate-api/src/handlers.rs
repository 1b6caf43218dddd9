//! Route handlers.

use axum::{
    extract::{Path, State},
    http::{header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use keygate_auth::{
    AuthError, Credential, InvalidRequestId, IssuedSession, RequestId, REQUEST_ID_HEADER,
    SERVER_VERSION,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cookies::append_set_cookie_headers;
use crate::error::ApiResult;
use crate::sso::SsoResponse;
use crate::state::ApiState;
use crate::API_PREFIX;

/// Console page WebSSO logins land on.
pub const WEBSSO_REDIRECT: &str = "/base/overview";

/// Plain message body.
#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub message: String,
}

/// Health response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok".
    pub status: String,
    /// Server version.
    pub version: String,
}

/// WebSSO callback form.
#[derive(Debug, Deserialize)]
pub struct WebSsoForm {
    /// Federation token posted back by Keystone.
    pub token: String,
}

/// Reads the optional `X-Openstack-Request-Id` header.
fn read_request_id(headers: &HeaderMap) -> Result<Option<RequestId>, InvalidRequestId> {
    let value = headers
        .get(REQUEST_ID_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()));
    RequestId::from_header(value.as_deref())
}

fn session_cookies(state: &ApiState, issued: &IssuedSession) -> Vec<String> {
    vec![
        state.cookies.session_cookie(&issued.token),
        state.cookies.expiry_cookie(issued.profile.session_expiry),
    ]
}

fn with_session(state: &ApiState, issued: IssuedSession) -> ApiResult<Response> {
    let cookies = session_cookies(state, &issued);
    let mut response = Json(issued.profile).into_response();
    append_set_cookie_headers(&mut response, &cookies)?;
    Ok(response)
}

/// `POST /login`
pub async fn login(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(credential): Json<Credential>,
) -> ApiResult<Response> {
    let request_id = read_request_id(&headers)?;
    let issued = state.flows.login(&credential, request_id.as_ref()).await?;
    with_session(&state, issued)
}

/// `GET /sso`
pub async fn sso(State(state): State<ApiState>, headers: HeaderMap) -> Json<SsoResponse> {
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    Json(state.sso.describe(host, API_PREFIX))
}

/// `POST /websso`
pub async fn websso(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Form(form): Form<WebSsoForm>,
) -> ApiResult<Response> {
    let request_id = read_request_id(&headers)?;
    let issued = state.flows.websso(&form.token, request_id.as_ref()).await?;
    let cookies = session_cookies(&state, &issued);

    let mut response = Redirect::to(WEBSSO_REDIRECT).into_response();
    *response.status_mut() = StatusCode::FOUND;
    append_set_cookie_headers(&mut response, &cookies)?;
    Ok(response)
}

/// `GET /profile`
pub async fn profile(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Response> {
    let request_id = read_request_id(&headers)?;
    let token = state
        .cookies
        .session_token(&headers)
        .ok_or(AuthError::MissingToken)?;
    let lookup = state
        .flows
        .current_profile(&token, request_id.as_ref())
        .await?;

    let cookies = match &lookup.renewed_token {
        Some(token) => vec![
            state.cookies.session_cookie(token),
            state.cookies.expiry_cookie(lookup.profile.session_expiry),
        ],
        None => Vec::new(),
    };

    let mut response = Json(lookup.profile).into_response();
    append_set_cookie_headers(&mut response, &cookies)?;
    Ok(response)
}

/// `POST /logout`
///
/// Always succeeds and always clears the session cookie. A malformed
/// request id is dropped rather than rejected.
pub async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let request_id = read_request_id(&headers).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring request id on logout");
        None
    });
    let token = state.cookies.session_token(&headers);
    state
        .flows
        .logout(token.as_deref(), request_id.as_ref())
        .await;

    let mut response = Json(Message {
        message: "Logout OK".to_string(),
    })
    .into_response();
    if let Err(e) =
        append_set_cookie_headers(&mut response, &[state.cookies.clear_session_cookie()])
    {
        warn!(error = %e, "Could not clear session cookie");
    }
    response
}

/// `POST /switch_project/{project_id}`
pub async fn switch_project(
    State(state): State<ApiState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request_id = read_request_id(&headers)?;
    let token = state
        .cookies
        .session_token(&headers)
        .ok_or(AuthError::MissingToken)?;
    let issued = state
        .flows
        .switch_project(&token, &project_id, request_id.as_ref())
        .await?;
    with_session(&state, issued)
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: SERVER_VERSION.to_string(),
    })
}
