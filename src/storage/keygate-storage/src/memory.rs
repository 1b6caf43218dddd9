//! In-memory revocation store.
//!
//! Used in development mode and in tests. Revocations are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{RevocationStore, StorageError};

/// Revocation store backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    revoked: RwLock<HashMap<String, i64>>,
}

impl MemoryRevocationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored revocations.
    pub async fn len(&self) -> usize {
        self.revoked.read().await.len()
    }

    /// Returns `true` if no revocation is stored.
    pub async fn is_empty(&self) -> bool {
        self.revoked.read().await.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn record_revocation(&self, session_id: &str, expiry: i64) -> Result<(), StorageError> {
        if session_id.is_empty() {
            return Err(StorageError::InvalidInput("session id cannot be empty".into()));
        }

        self.revoked
            .write()
            .await
            .entry(session_id.to_string())
            .and_modify(|current| *current = (*current).max(expiry))
            .or_insert(expiry);
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, StorageError> {
        Ok(self.revoked.read().await.contains_key(session_id))
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, StorageError> {
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, expiry| *expiry >= now);
        Ok((before - revoked.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
