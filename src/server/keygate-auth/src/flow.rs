//! Login, logout, project switch and profile flows.
//!
//! Each flow is a straight sequence of identity-service calls. A failure at
//! any step ends the flow with an [`AuthError`] before any session token is
//! produced; only logout swallows its failures.

use std::fmt;
use std::sync::Arc;

use keygate_storage::RevocationStore;
use tracing::{debug, info, warn};

use crate::{
    AuthContext, AuthError, AuthSettings, Credential, IdentityClient, Payload, Profile,
    ProfileBuilder, ProfileRequest, RequestId, SessionCodec,
};

/// Progress of a login, used to report where it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    /// Credential not yet accepted.
    Unauthenticated,
    /// Unscoped token obtained, scopes not yet listed.
    CredentialAccepted,
    /// Scopes listed.
    ScopeDiscovered,
    /// Project-scoped token issued.
    ScopedTokenIssued,
    /// Profile built and enriched.
    ProfileEnriched,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::CredentialAccepted => "credential_accepted",
            Self::ScopeDiscovered => "scope_discovered",
            Self::ScopedTokenIssued => "scoped_token_issued",
            Self::ProfileEnriched => "profile_enriched",
        };
        f.write_str(name)
    }
}

/// A profile together with its signed session token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Enriched profile.
    pub profile: Profile,
    /// Signed session token for the cookie.
    pub token: String,
}

/// Result of reading the current profile.
#[derive(Debug, Clone)]
pub struct ProfileLookup {
    /// Enriched profile.
    pub profile: Profile,
    /// New session token when the session was close to expiry.
    pub renewed_token: Option<String>,
}

/// Orchestrates the identity client, profile builder, session codec and
/// revocation store into the user-facing operations.
///
/// Every operation that reaches the identity service takes the caller's
/// [`RequestId`], if any, and passes it on each upstream call.
pub struct AuthFlows {
    identity: Arc<dyn IdentityClient>,
    revocations: Arc<dyn RevocationStore>,
    codec: SessionCodec,
    profiles: ProfileBuilder,
    settings: Arc<AuthSettings>,
}

impl AuthFlows {
    /// Creates the flows.
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        revocations: Arc<dyn RevocationStore>,
        codec: SessionCodec,
        settings: Arc<AuthSettings>,
    ) -> Self {
        let profiles = ProfileBuilder::new(Arc::clone(&identity), Arc::clone(&settings));
        Self {
            identity,
            revocations,
            codec,
            profiles,
            settings,
        }
    }

    /// Returns the session codec.
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Returns the flow settings.
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Logs in with a password or token credential.
    pub async fn login(
        &self,
        credential: &Credential,
        request_id: Option<&RequestId>,
    ) -> Result<IssuedSession, AuthError> {
        let region = credential.region();
        let ctx = match credential {
            Credential::Password {
                username,
                password,
                domain,
                ..
            } => {
                let domain = domain.as_deref().unwrap_or(&self.settings.default_domain);
                self.identity
                    .authenticate_password(region, domain, username, password, request_id)
                    .await
            },
            Credential::Token { token, .. } => {
                self.identity
                    .authenticate_token(region, token, request_id)
                    .await
            },
        }
        .map_err(|e| rejected(LoginStage::Unauthenticated, request_id, e))?;

        debug!(
            region = %region,
            user_id = %ctx.user_id,
            method = ?credential.method(),
            request_id = request_id.map(RequestId::as_str),
            "Credential accepted"
        );

        self.establish(ctx, request_id).await
    }

    /// Logs in with a WebSSO federation token in the configured SSO region.
    pub async fn websso(
        &self,
        token: &str,
        request_id: Option<&RequestId>,
    ) -> Result<IssuedSession, AuthError> {
        let ctx = self
            .identity
            .authenticate_token(&self.settings.sso_region, token, request_id)
            .await
            .map_err(|e| rejected(LoginStage::Unauthenticated, request_id, e))?;

        self.establish(ctx, request_id).await
    }

    /// Runs the login from scope discovery to the signed session.
    async fn establish(
        &self,
        ctx: AuthContext,
        request_id: Option<&RequestId>,
    ) -> Result<IssuedSession, AuthError> {
        let stage = LoginStage::CredentialAccepted;
        let scopes = self
            .identity
            .list_scopes(&ctx, true, request_id)
            .await
            .map_err(|e| rejected(stage, request_id, e))?;
        if scopes.is_empty() {
            return Err(rejected(stage, request_id, AuthError::NoAuthorizedScopes));
        }

        let stage = LoginStage::ScopeDiscovered;
        let default_project = self
            .identity
            .user_default_project(&ctx.token, &ctx.region, &ctx.user_id, request_id)
            .await
            .map_err(|e| rejected(stage, request_id, e))?
            .filter(|id| scopes.iter().any(|scope| &scope.id == id));
        let target = default_project.as_deref().unwrap_or(scopes[0].id.as_str());

        let scoped_token = self
            .identity
            .issue_scoped_token(&ctx.token, &ctx.region, target, request_id)
            .await
            .map_err(|e| rejected(stage, request_id, e))?;

        let stage = LoginStage::ScopedTokenIssued;
        let profile = self
            .profiles
            .build(
                ProfileRequest::new(scoped_token, ctx.region.clone())
                    .with_request_id(request_id.cloned()),
            )
            .await
            .map_err(|e| rejected(stage, request_id, e))?;
        let profile = self
            .patch_profile(profile, request_id)
            .await
            .map_err(|e| rejected(stage, request_id, e))?;

        let stage = LoginStage::ProfileEnriched;
        let token = self
            .codec
            .encode(&profile)
            .map_err(|e| rejected(stage, request_id, e))?;

        info!(
            region = %profile.region,
            user_id = %profile.user.id,
            project_id = %profile.project.id,
            session_id = %profile.session_id,
            request_id = request_id.map(RequestId::as_str),
            "Session issued"
        );

        Ok(IssuedSession { profile, token })
    }

    /// Attaches the endpoint catalog, the project list and the default
    /// project to `profile`.
    ///
    /// When the identity service lists no projects for the user, the scopes
    /// are derived again by authenticating with the profile's token.
    pub async fn patch_profile(
        &self,
        mut profile: Profile,
        request_id: Option<&RequestId>,
    ) -> Result<Profile, AuthError> {
        let token = profile.keystone_token.clone();
        let region = profile.region.clone();

        profile.endpoints = self.identity.endpoints(&token, &region, request_id).await?;

        let mut projects = self
            .identity
            .user_projects(&token, &region, &profile.user.id, request_id)
            .await?;
        if projects.is_empty() {
            debug!(
                user_id = %profile.user.id,
                "No projects listed for user, deriving scopes from token"
            );
            let ctx = self
                .identity
                .authenticate_token(&region, &token, request_id)
                .await?;
            projects = self.identity.list_scopes(&ctx, false, request_id).await?;
        }

        let default_project = self
            .identity
            .user_default_project(&token, &region, &profile.user.id, request_id)
            .await?;

        profile.set_projects(projects);
        profile.set_default_project(default_project);

        Ok(profile)
    }

    /// Opens a session token: signature, expiry and revocation.
    pub async fn open_session(&self, session_token: &str) -> Result<Payload, AuthError> {
        if session_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let payload = self.codec.decode(session_token)?;
        if self
            .revocations
            .is_revoked(&payload.uuid.to_string())
            .await?
        {
            debug!(session_id = %payload.uuid, "Rejected revoked session");
            return Err(AuthError::Revoked);
        }

        Ok(payload)
    }

    /// Returns the enriched profile of the session, re-issuing the session
    /// when it is within the renew window.
    pub async fn current_profile(
        &self,
        session_token: &str,
        request_id: Option<&RequestId>,
    ) -> Result<ProfileLookup, AuthError> {
        let payload = self.open_session(session_token).await?;

        let renew = payload.remaining_secs(crate::unix_now()) < self.settings.renew_window_secs;
        let mut request =
            ProfileRequest::from_payload(&payload).with_request_id(request_id.cloned());
        if renew {
            request = request.with_fresh_expiry();
        }

        let profile = self.profiles.build(request).await?;
        let profile = self.patch_profile(profile, request_id).await?;

        let renewed_token = if renew {
            debug!(session_id = %profile.session_id, "Renewing session");
            Some(self.codec.encode(&profile)?)
        } else {
            None
        };

        Ok(ProfileLookup {
            profile,
            renewed_token,
        })
    }

    /// Rescopes the session to `project_id`, keeping the session id.
    pub async fn switch_project(
        &self,
        session_token: &str,
        project_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<IssuedSession, AuthError> {
        let payload = self.open_session(session_token).await?;

        let scoped_token = self
            .identity
            .issue_scoped_token(&payload.keystone_token, &payload.region, project_id, request_id)
            .await?;

        let profile = self
            .profiles
            .build(
                ProfileRequest::new(scoped_token, payload.region)
                    .with_session_id(payload.uuid)
                    .with_request_id(request_id.cloned()),
            )
            .await?;
        let profile = self.patch_profile(profile, request_id).await?;
        let token = self.codec.encode(&profile)?;

        info!(
            user_id = %profile.user.id,
            project_id = %profile.project.id,
            session_id = %profile.session_id,
            request_id = request_id.map(RequestId::as_str),
            "Switched project"
        );

        Ok(IssuedSession { profile, token })
    }

    /// Ends the session. Never fails.
    ///
    /// Revokes the keystone token and records the session as revoked; every
    /// step is attempted independently and failures are only logged.
    pub async fn logout(&self, session_token: Option<&str>, request_id: Option<&RequestId>) {
        let Some(session_token) = session_token.filter(|t| !t.is_empty()) else {
            return;
        };

        let payload = match self.codec.decode(session_token) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Ignoring unreadable session on logout");
                return;
            },
        };

        match self
            .profiles
            .build(ProfileRequest::from_payload(&payload).with_request_id(request_id.cloned()))
            .await
        {
            Ok(profile) => info!(
                user_id = %profile.user.id,
                session_id = %payload.uuid,
                request_id = request_id.map(RequestId::as_str),
                "Logging out"
            ),
            Err(e) => debug!(error = %e, session_id = %payload.uuid, "Could not rebuild profile"),
        }

        if let Err(e) = self
            .identity
            .revoke_token(&payload.keystone_token, &payload.region, request_id)
            .await
        {
            debug!(error = %e, session_id = %payload.uuid, "Could not revoke keystone token");
        }

        if let Err(e) = self
            .revocations
            .record_revocation(&payload.uuid.to_string(), payload.exp)
            .await
        {
            debug!(error = %e, session_id = %payload.uuid, "Could not record revocation");
        }
    }
}

fn rejected(stage: LoginStage, request_id: Option<&RequestId>, error: AuthError) -> AuthError {
    warn!(
        stage = %stage,
        request_id = request_id.map(RequestId::as_str),
        error = %error,
        "Login rejected"
    );
    error
}
