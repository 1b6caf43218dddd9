//! # Keygate Auth
//!
//! Authentication against Keystone and client-side session management.
//!
//! ## Components
//!
//! - [`IdentityClient`]: the identity service, implemented for Keystone v3
//!   by [`KeystoneClient`]
//! - [`ProfileBuilder`]: builds session profiles from token metadata
//! - [`SessionCodec`]: signs profiles into session tokens and opens them
//! - [`AuthFlows`]: login, WebSSO, profile, project switch and logout

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod keystone;
pub mod profile;
pub mod request_id;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::IdentityClient;
pub use config::AuthSettings;
pub use context::{
    AuthContext, AuthMethod, Credential, Domain, Role, Scope, TokenMetadata, TokenProject,
    TokenUser,
};
pub use error::AuthError;
pub use flow::{AuthFlows, IssuedSession, LoginStage, ProfileLookup};
pub use keystone::{KeystoneClient, KeystoneConfig};
pub use profile::{Profile, ProfileBuilder, ProfileRequest, ProjectInfo, SERVER_VERSION};
pub use request_id::{InvalidRequestId, RequestId, REQUEST_ID_HEADER};
pub use session::{Payload, SessionCodec};

/// Returns the current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
