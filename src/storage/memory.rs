//! In-memory expiring store for development, testing and single-node deployments
//!
//! Expiry is enforced lazily on every read and eagerly by an optional sweeper task.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::ExpiringStore;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory implementation of [`ExpiringStore`]
pub struct MemoryStore {
    name: &'static str,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create a new store; `name` only shows up in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        let removed = before - entries.len();

        if removed > 0 {
            log::debug!("Purged {} expired entries from {} store", removed, self.name);
        }
        removed
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.purge_expired().await;
            }
        })
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: chrono::Duration) -> Result<()> {
        let mut entries = self.entries.write().await;

        // Non-positive TTL: the write lands already expired
        let ttl = match ttl.to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => {
                entries.remove(key);
                return Ok(());
            }
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .map_or(false, |e| e.is_live(Instant::now())))
    }
}
