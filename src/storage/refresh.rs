//! Refresh token records
//!
//! key = refresh token value, value = `userID;signature`

use crate::auth::claims::TokenReference;
use crate::error::Result;
use crate::storage::traits::SharedStore;

/// Refresh token namespace over an expiring store
#[derive(Clone)]
pub struct RefreshTokenStore {
    store: SharedStore,
}

impl RefreshTokenStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Persist a refresh record for `ttl`
    pub async fn save(&self, token: &str, reference: &TokenReference, ttl: chrono::Duration) -> Result<()> {
        self.store.set(token, &reference.to_string(), ttl).await
    }

    /// Consume a refresh record.
    ///
    /// Returns the stored reference only to the caller whose delete removed it;
    /// a concurrent consumer of the same token gets `None`. A stored value that
    /// no longer parses is dropped and treated as absent.
    pub async fn consume(&self, token: &str) -> Result<Option<TokenReference>> {
        let raw = match self.store.get(token).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        if !self.store.delete(token).await? {
            log::warn!("Refresh token consumed concurrently, rejecting duplicate use");
            return Ok(None);
        }

        match TokenReference::parse(&raw) {
            Ok(reference) => Ok(Some(reference)),
            Err(_) => {
                log::error!("Discarding malformed refresh record");
                Ok(None)
            }
        }
    }
}
