use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, TokenGateError};

/// A user as seen by the token service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user identifier
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Single role carried into access tokens
    pub role: String,
    /// Per-user secret, rotated on every password change.
    /// Embedded in refresh records so rotating it voids them all.
    #[serde(default = "new_signature")]
    pub signature: String,
    /// PHC formatted password hash
    pub password_hash: String,
}

impl UserRecord {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        role: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            role: role.into(),
            signature: new_signature(),
            password_hash: password_hash.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    fn matches_login(&self, login: &str) -> bool {
        self.username.eq_ignore_ascii_case(login)
            || self
                .email
                .as_deref()
                .map_or(false, |e| e.eq_ignore_ascii_case(login))
    }
}

/// Fresh random user signature
pub fn new_signature() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// User lookup collaborator
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with `NotFound` if the user does not exist
    async fn get_by_id(&self, user_id: &str) -> Result<UserRecord>;

    /// Lookup by username or email. Fails with `NotFound` if absent.
    async fn find_by_login(&self, login: &str) -> Result<UserRecord>;

    /// Store a new password hash together with a new signature
    async fn change_password(&self, user_id: &str, password_hash: &str, signature: &str) -> Result<()>;
}

/// Shared reference to a user directory
pub type SharedUserDirectory = Arc<dyn UserDirectory>;

/// In-memory user directory for development and testing
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Load users from a JSON array of [`UserRecord`]
    pub async fn load_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            TokenGateError::config(format!("cannot read users file {}: {}", path.display(), e))
        })?;
        let records: Vec<UserRecord> = serde_json::from_str(&raw).map_err(|e| {
            TokenGateError::config(format!("invalid users file {}: {}", path.display(), e))
        })?;

        let directory = Self::new();
        for record in records {
            directory.insert(record).await;
        }
        log::info!("Loaded {} users from {}", directory.len().await, path.display());
        Ok(directory)
    }

    /// Insert or replace a user
    pub async fn insert(&self, user: UserRecord) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_by_id(&self, user_id: &str) -> Result<UserRecord> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| TokenGateError::not_found(format!("user {} not found", user_id)))
    }

    async fn find_by_login(&self, login: &str) -> Result<UserRecord> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.matches_login(login))
            .cloned()
            .ok_or_else(|| TokenGateError::not_found("No entities found with given parameters"))
    }

    async fn change_password(&self, user_id: &str, password_hash: &str, signature: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| TokenGateError::not_found(format!("user {} not found", user_id)))?;
        user.password_hash = password_hash.to_string();
        user.signature = signature.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_id_and_login() {
        let directory = MemoryUserDirectory::new();
        directory
            .insert(UserRecord::new("u1", "alice", "tech", "hash").with_email("alice@example.com"))
            .await;

        assert_eq!(directory.get_by_id("u1").await.unwrap().username, "alice");
        assert_eq!(directory.find_by_login("ALICE").await.unwrap().id, "u1");
        assert_eq!(directory.find_by_login("alice@example.com").await.unwrap().id, "u1");

        let err = directory.get_by_id("missing").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
        assert!(directory.find_by_login("bob").await.is_err());
    }

    #[tokio::test]
    async fn test_change_password_rotates_signature() {
        let directory = MemoryUserDirectory::new();
        let user = UserRecord::new("u1", "alice", "tech", "old-hash");
        let old_signature = user.signature.clone();
        directory.insert(user).await;

        let fresh = new_signature();
        directory.change_password("u1", "new-hash", &fresh).await.unwrap();

        let user = directory.get_by_id("u1").await.unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(user.signature, fresh);
        assert_ne!(user.signature, old_signature);

        assert!(directory.change_password("nobody", "h", "s").await.is_err());
    }

    #[test]
    fn test_record_defaults_signature_when_deserialized() {
        let json = r#"{"id":"u1","username":"alice","role":"admin","password_hash":"h"}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert!(!user.signature.is_empty());
        assert!(user.email.is_none());
    }
}
