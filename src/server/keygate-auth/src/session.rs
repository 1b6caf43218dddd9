//! Signed session tokens.
//!
//! A session token is an HS256 JWT carrying just enough to rebuild the
//! profile: the scoped keystone token, its region, the session expiry and
//! the session id. It is the only thing the browser holds.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthError, Profile};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Project-scoped keystone token.
    pub keystone_token: String,
    /// Region the token belongs to.
    pub region: String,
    /// Session expiry (Unix seconds).
    pub exp: i64,
    /// Session id.
    pub uuid: Uuid,
}

impl From<&Profile> for Payload {
    fn from(profile: &Profile) -> Self {
        Self {
            keystone_token: profile.keystone_token.clone(),
            region: profile.region.clone(),
            exp: profile.session_expiry,
            uuid: profile.session_id,
        }
    }
}

impl Payload {
    /// Seconds left until the session expires (negative once expired).
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.exp - now
    }
}

/// Encodes profiles into session tokens and opens them again.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    /// Creates a codec signing with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let encoding_key = EncodingKey::from_secret(secret);
        let decoding_key = DecodingKey::from_secret(secret);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Signs the session claims of `profile`.
    pub fn encode(&self, profile: &Profile) -> Result<String, AuthError> {
        self.encode_payload(&Payload::from(profile))
    }

    /// Signs `payload` as is.
    pub fn encode_payload(&self, payload: &Payload) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), payload, &self.encoding_key)
            .map_err(|e| AuthError::Configuration(format!("failed to sign session: {e}")))
    }

    /// Verifies the signature and expiry of `token` and returns its claims.
    pub fn decode(&self, token: &str) -> Result<Payload, AuthError> {
        let token_data =
            decode::<Payload>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::InvalidSignature,
                }
            })?;

        Ok(token_data.claims)
    }
}
