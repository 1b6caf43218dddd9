//! WebSSO configuration exposed to the console.

use serde::{Deserialize, Serialize};

/// WebSSO settings.
#[derive(Debug, Clone, Default)]
pub struct SsoSettings {
    /// Whether WebSSO is offered.
    pub enabled: bool,
    /// Federation protocols (e.g., "openid", "saml2").
    pub protocols: Vec<String>,
    /// Public Keystone v3 URL the browser is sent to.
    pub keystone_url: String,
    /// Path prefix of the console behind the reverse proxy.
    pub nginx_prefix: String,
    /// Whether the console is served over HTTPS.
    pub ssl_enabled: bool,
}

/// One federation protocol and its login URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoProtocol {
    /// Protocol name.
    pub protocol: String,
    /// Keystone WebSSO URL with the callback origin.
    pub url: String,
}

/// Body of `GET /sso`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoResponse {
    /// Whether WebSSO is offered.
    pub enable_sso: bool,
    /// Available protocols; empty when disabled.
    pub protocols: Vec<SsoProtocol>,
}

impl SsoSettings {
    /// Builds the SSO description for a request to `host`.
    pub fn describe(&self, host: &str, api_prefix: &str) -> SsoResponse {
        if !self.enabled {
            return SsoResponse {
                enable_sso: false,
                protocols: Vec::new(),
            };
        }

        let scheme = if self.ssl_enabled { "https" } else { "http" };
        let keystone_url = self.keystone_url.trim_end_matches('/');
        let origin = format!("{scheme}://{host}{}{api_prefix}/websso", self.base_path());

        let protocols = self
            .protocols
            .iter()
            .map(|protocol| SsoProtocol {
                protocol: protocol.clone(),
                url: format!(
                    "{keystone_url}/auth/OS-FEDERATION/websso/{protocol}?origin={origin}"
                ),
            })
            .collect();

        SsoResponse {
            enable_sso: true,
            protocols,
        }
    }

    /// Path the console is mounted at: `/{nginx_prefix}/skyline`.
    fn base_path(&self) -> String {
        let prefix = self.nginx_prefix.trim_matches('/');
        if prefix.is_empty() {
            "/skyline".to_string()
        } else {
            format!("/{prefix}/skyline")
        }
    }
}
