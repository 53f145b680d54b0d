//! Abstract storage interface for pluggable expiring key-value backends
//!
//! The token service keeps all of its mutable state behind this trait, so every
//! check reads the backend fresh and revocations are visible to all requests
//! as soon as the write returns.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Key-value store with a TTL per key
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any previous value.
    /// A zero or negative `ttl` expires the key immediately.
    async fn set(&self, key: &str, value: &str, ttl: chrono::Duration) -> Result<()>;

    /// Returns `None` for missing or expired keys
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`. Returns `true` only for the caller that removed a live
    /// value, so concurrent deleters of the same key see exactly one `true`.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Shared reference to an expiring store
pub type SharedStore = Arc<dyn ExpiringStore>;
