//! Revocation store trait definition.

use async_trait::async_trait;

use crate::error::StorageError;

/// Persists identifiers of sessions that must no longer be accepted.
///
/// Expiry values are Unix seconds and mirror the `exp` claim of the session
/// token. A revocation only needs to outlive the token it revokes.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Records that `session_id` was revoked. Repeated calls for the same
    /// session keep the largest expiry seen.
    async fn record_revocation(&self, session_id: &str, expiry: i64) -> Result<(), StorageError>;

    /// Returns `true` if `session_id` was revoked.
    async fn is_revoked(&self, session_id: &str) -> Result<bool, StorageError>;

    /// Removes revocations whose expiry is before `now`.
    ///
    /// Returns the number of removed entries.
    async fn purge_expired(&self, now: i64) -> Result<u64, StorageError>;

    /// Returns the name of this store for logging.
    fn name(&self) -> &'static str;
}
