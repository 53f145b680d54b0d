//! Token revocation storage
//!
//! Revoked access tokens are tracked by their token id (jti) until the token
//! could no longer pass verification anyway. Absence of a record means the
//! token is not revoked.

use crate::error::Result;
use crate::storage::traits::SharedStore;

/// Revocation namespace over an expiring store. key = value = token id.
#[derive(Clone)]
pub struct RevocationList {
    store: SharedStore,
}

impl RevocationList {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Deny `token_id` for `ttl`
    pub async fn revoke(&self, token_id: &str, ttl: chrono::Duration) -> Result<()> {
        self.store.set(token_id, token_id, ttl).await?;
        log::info!("Token revoked: {}", token_id);
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: &str) -> Result<bool> {
        Ok(self.store.get(token_id).await?.is_some())
    }
}
