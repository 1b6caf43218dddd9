//! Caller-supplied request ids.
//!
//! A console may tag a request with `X-Openstack-Request-Id: req-<uuid>`.
//! The id is forwarded to every identity-service call the request makes so
//! both sides log the same value.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Header carrying the request id, inbound and towards the identity service.
pub const REQUEST_ID_HEADER: &str = "X-Openstack-Request-Id";

const PREFIX: &str = "req-";
const HYPHENATED_LEN: usize = 36;

/// Rejected request id value.
#[derive(Debug, Error)]
#[error("invalid request id {0:?}: expected req-<uuid>")]
pub struct InvalidRequestId(String);

/// A validated `req-<uuid>` request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Parses an optional header value.
    ///
    /// An absent or empty value yields `None`.
    pub fn from_header(value: Option<&str>) -> Result<Option<Self>, InvalidRequestId> {
        match value {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }

    /// Returns the id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RequestId {
    type Err = InvalidRequestId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let valid = value
            .strip_prefix(PREFIX)
            .filter(|id| id.len() == HYPHENATED_LEN)
            .is_some_and(|id| Uuid::try_parse(id).is_ok());
        if !valid {
            return Err(InvalidRequestId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
