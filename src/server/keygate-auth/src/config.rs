//! Flow settings.

/// Immutable settings shared by the login, logout and profile flows.
///
/// Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Sessions closer than this to their expiry are re-issued on profile
    /// reads.
    pub renew_window_secs: i64,
    /// User domain for password logins that do not name one.
    pub default_domain: String,
    /// Base domains copied into every profile.
    pub base_domains: Vec<String>,
    /// Region used for WebSSO logins.
    pub sso_region: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: 3600,
            renew_window_secs: 1800,
            default_domain: "Default".to_string(),
            base_domains: Vec::new(),
            sso_region: "RegionOne".to_string(),
        }
    }
}
