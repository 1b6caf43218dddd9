//! # Keygate API
//!
//! HTTP layer of the gateway.
//!
//! ## Endpoints
//!
//! All routes live under [`API_PREFIX`]:
//!
//! - `POST /login` - Password or token login
//! - `GET /sso` - WebSSO availability and per-protocol redirect URLs
//! - `POST /websso` - WebSSO callback, redirects to the console
//! - `GET /profile` - Current session profile
//! - `POST /logout` - End the session
//! - `POST /switch_project/{project_id}` - Rescope the session
//! - `GET /health` - Liveness

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cookies;
pub mod error;
pub mod handlers;
pub mod sso;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use cookies::CookieSettings;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use sso::{SsoProtocol, SsoResponse, SsoSettings};
pub use state::ApiState;

/// Prefix every route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Builds the gateway router.
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/login", post(handlers::login))
        .route("/sso", get(handlers::sso))
        .route("/websso", post(handlers::websso))
        .route("/profile", get(handlers::profile))
        .route("/logout", post(handlers::logout))
        .route("/switch_project/{project_id}", post(handlers::switch_project))
        .route("/health", get(handlers::health))
        .with_state(state);

    Router::new().nest(API_PREFIX, api)
}
