//! Password reset links
//!
//! key = reset id, value = user id

use crate::error::Result;
use crate::storage::traits::SharedStore;

/// Reset link namespace over an expiring store
#[derive(Clone)]
pub struct ResetLinkStore {
    store: SharedStore,
}

impl ResetLinkStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a fresh reset id for `user_id` and return it
    pub async fn create(&self, user_id: &str, ttl: chrono::Duration) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.store.set(&id, user_id, ttl).await?;
        Ok(id)
    }

    /// Consume a reset id, returning the user it was issued for.
    ///
    /// Only the caller whose delete removed the record gets the user id back.
    pub async fn consume(&self, id: &str) -> Result<Option<String>> {
        let user_id = match self.store.get(id).await? {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        if !self.store.delete(id).await? {
            log::warn!("Reset link used concurrently, rejecting duplicate use");
            return Ok(None);
        }
        Ok(Some(user_id))
    }
}
