//! API state.

use std::sync::Arc;

use keygate_auth::AuthFlows;

use crate::cookies::CookieSettings;
use crate::sso::SsoSettings;

/// Shared state handed to every handler.
///
/// Everything is immutable after startup.
#[derive(Clone)]
pub struct ApiState {
    /// Authentication flows.
    pub flows: Arc<AuthFlows>,
    /// Cookie settings.
    pub cookies: Arc<CookieSettings>,
    /// WebSSO settings.
    pub sso: Arc<SsoSettings>,
}

impl ApiState {
    /// Creates the API state.
    pub fn new(flows: AuthFlows, cookies: CookieSettings, sso: SsoSettings) -> Self {
        Self {
            flows: Arc::new(flows),
            cookies: Arc::new(cookies),
            sso: Arc::new(sso),
        }
    }
}
