//! Session cookie helpers.

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use axum::response::Response;

use crate::error::ApiError;

/// Cookie carrying the session expiry (Unix seconds) for the console.
pub const TIME_EXPIRED_COOKIE: &str = "time_expired";

/// Cookie settings.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Name of the session cookie.
    pub session_name: String,
    /// Adds the `Secure` attribute.
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            session_name: "session".to_string(),
            secure: false,
        }
    }
}

impl CookieSettings {
    /// `Set-Cookie` value carrying the session token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            self.session_name,
            token,
            self.secure_attr()
        )
    }

    /// `Set-Cookie` value carrying the session expiry.
    pub fn expiry_cookie(&self, exp: i64) -> String {
        format!(
            "{TIME_EXPIRED_COOKIE}={exp}; Path=/; SameSite=Lax{}",
            self.secure_attr()
        )
    }

    /// `Set-Cookie` value deleting the session cookie.
    pub fn clear_session_cookie(&self) -> String {
        format!(
            "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax{}",
            self.session_name,
            self.secure_attr()
        )
    }

    /// Returns the session token from the request cookies.
    pub fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.session_name)
    }

    fn secure_attr(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }
}

/// Returns the value of cookie `name`, searching every `Cookie` header.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Appends `Set-Cookie` headers to `response`.
pub fn append_set_cookie_headers(
    response: &mut Response,
    cookies: &[String],
) -> Result<(), ApiError> {
    for cookie in cookies {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| ApiError::Internal(format!("invalid cookie header: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(())
}
