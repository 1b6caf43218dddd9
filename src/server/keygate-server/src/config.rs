//! Server configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use keygate_api::{CookieSettings, SsoSettings};
use keygate_auth::{AuthSettings, KeystoneConfig};
use serde::Deserialize;

/// Top-level configuration, one field per TOML section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionSection,
    pub keystone: KeystoneSection,
    pub sso: SsoSection,
    pub storage: StorageSection,
}

/// `[session]`
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Session signing secret. Required outside dev mode.
    pub secret_key: Option<String>,
    pub cookie_name: String,
    pub ttl_secs: i64,
    pub renew_window_secs: i64,
    pub ssl_enabled: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            secret_key: None,
            cookie_name: "session".to_string(),
            ttl_secs: 3600,
            renew_window_secs: 1800,
            ssl_enabled: false,
        }
    }
}

impl std::fmt::Debug for SessionSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSection")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("cookie_name", &self.cookie_name)
            .field("ttl_secs", &self.ttl_secs)
            .field("renew_window_secs", &self.renew_window_secs)
            .field("ssl_enabled", &self.ssl_enabled)
            .finish()
    }
}

/// `[keystone]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeystoneSection {
    pub auth_url: String,
    /// Region name to Keystone URL, for regions not served by `auth_url`.
    pub regions: HashMap<String, String>,
    pub interface: String,
    pub timeout_secs: u64,
    pub default_domain: String,
    pub base_domains: Vec<String>,
}

impl Default for KeystoneSection {
    fn default() -> Self {
        Self {
            auth_url: "http://localhost:5000/v3".to_string(),
            regions: HashMap::new(),
            interface: "public".to_string(),
            timeout_secs: 30,
            default_domain: "Default".to_string(),
            base_domains: Vec::new(),
        }
    }
}

/// `[sso]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SsoSection {
    pub enabled: bool,
    pub protocols: Vec<String>,
    pub region: String,
    /// Keystone URL as reachable from the browser; `keystone.auth_url` when
    /// empty.
    pub keystone_url: String,
    pub nginx_prefix: String,
}

impl Default for SsoSection {
    fn default() -> Self {
        Self {
            enabled: false,
            protocols: Vec::new(),
            region: "RegionOne".to_string(),
            keystone_url: String::new(),
            nginx_prefix: "api/openstack".to_string(),
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    pub fn keystone_config(&self) -> KeystoneConfig {
        KeystoneConfig {
            auth_url: self.keystone.auth_url.clone(),
            regions: self.keystone.regions.clone(),
            interface: self.keystone.interface.clone(),
            timeout: Duration::from_secs(self.keystone.timeout_secs),
        }
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            session_ttl_secs: self.session.ttl_secs,
            renew_window_secs: self.session.renew_window_secs,
            default_domain: self.keystone.default_domain.clone(),
            base_domains: self.keystone.base_domains.clone(),
            sso_region: self.sso.region.clone(),
        }
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            session_name: self.session.cookie_name.clone(),
            secure: self.session.ssl_enabled,
        }
    }

    pub fn sso_settings(&self) -> SsoSettings {
        let keystone_url = if self.sso.keystone_url.is_empty() {
            self.keystone.auth_url.clone()
        } else {
            self.sso.keystone_url.clone()
        };

        SsoSettings {
            enabled: self.sso.enabled,
            protocols: self.sso.protocols.clone(),
            keystone_url,
            nginx_prefix: self.sso.nginx_prefix.clone(),
            ssl_enabled: self.session.ssl_enabled,
        }
    }
}
