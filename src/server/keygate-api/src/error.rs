//! API error types.
//!
//! Every authentication failure becomes the same 401 response; only the
//! error code and detail in the body tell them apart. A malformed request
//! id header is a 400.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keygate_auth::{AuthError, InvalidRequestId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed at any step of a flow.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// `X-Openstack-Request-Id` is not `req-<uuid>`.
    #[error(transparent)]
    InvalidRequestId(#[from] InvalidRequestId),

    /// A response could not be assembled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequestId(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(err) => err.code(),
            Self::InvalidRequestId(_) => "invalid_request_id",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error: String,
    /// Human-readable error message.
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.error_code().to_string(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
