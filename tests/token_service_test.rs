use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokengate::auth::claims::INVALID_REFRESH_TOKEN;
use tokengate::auth::{AccessClaims, MemoryUserDirectory, UserDirectory, UserRecord};
use tokengate::config::GateConfig;
use tokengate::services::TokenService;
use tokengate::storage::{ExpiringStore, MemoryStore, SharedStore};
use tokengate::{Result, TokenGateError};

const SIGNING_KEY: &str = "Zq8-integration-tests-signing-key-7f3a9c2e41";

async fn setup() -> (Arc<MemoryUserDirectory>, Arc<TokenService>) {
    let config = GateConfig::new(SIGNING_KEY).unwrap();
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .insert(UserRecord::new("user-1", "alice", "manager", "unused-hash"))
        .await;

    let refresh_store: SharedStore = Arc::new(MemoryStore::new("refresh-token"));
    let revocation_store: SharedStore = Arc::new(MemoryStore::new("revocation"));
    let service = TokenService::new(
        &config,
        users.clone(),
        refresh_store,
        revocation_store,
    );
    (users, Arc::new(service))
}

#[tokio::test]
async fn test_issued_token_is_not_revoked() {
    let (_, service) = setup().await;

    let pair = service.issue("user-1").await.unwrap();
    let claims = service.authenticate(&pair.access_token).await.unwrap();

    assert!(service.check_revoked(&claims.jti).await.is_ok());
}

#[tokio::test]
async fn test_access_claims_round_trip() {
    let (_, service) = setup().await;

    let pair = service.issue("user-1").await.unwrap();
    let claims = service
        .token_manager()
        .verify(&pair.access_token)
        .unwrap();

    assert_eq!(claims.sub, "user-1");
    assert_eq!(claims.role, "manager");
    assert_eq!(claims.exp - claims.iat, 300);
    assert!(!claims.jti.is_empty());
    assert_eq!(pair.access_expires_at, claims.expires_at());
}

#[tokio::test]
async fn test_revoked_token_is_forbidden() {
    let (_, service) = setup().await;

    let pair = service.issue("user-1").await.unwrap();
    let claims = service.authenticate(&pair.access_token).await.unwrap();
    service.revoke(&claims.jti, claims.expires_at()).await.unwrap();

    let err = service.check_revoked(&claims.jti).await.unwrap_err();
    assert!(matches!(err, TokenGateError::Forbidden { .. }));
    assert_eq!(err.message(), "Token has been revoked");

    let err = service.authenticate(&pair.access_token).await.unwrap_err();
    assert_eq!(err.status(), 403);
}

#[tokio::test]
async fn test_revoke_with_past_expiry_still_denies() {
    let (_, service) = setup().await;

    service
        .revoke("stale-token-id", Utc::now() - Duration::minutes(10))
        .await
        .unwrap();

    let err = service.check_revoked("stale-token-id").await.unwrap_err();
    assert!(matches!(err, TokenGateError::Forbidden { .. }));
}

#[tokio::test]
async fn test_revocation_is_per_token() {
    let (_, service) = setup().await;

    let first = service.issue("user-1").await.unwrap();
    let second = service.issue("user-1").await.unwrap();
    let first_claims = service.authenticate(&first.access_token).await.unwrap();
    service
        .revoke(&first_claims.jti, first_claims.expires_at())
        .await
        .unwrap();

    assert!(service.authenticate(&first.access_token).await.is_err());
    assert!(service.authenticate(&second.access_token).await.is_ok());
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let (_, service) = setup().await;

    let pair = service.issue("user-1").await.unwrap();
    let rotated = service.refresh(&pair.refresh_token).await.unwrap();

    assert_ne!(rotated.refresh_token, pair.refresh_token);
    assert_ne!(rotated.access_token, pair.access_token);

    let err = service.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, TokenGateError::BadRequest { .. }));
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);

    // The rotated token is still good exactly once
    assert!(service.refresh(&rotated.refresh_token).await.is_ok());
    assert!(service.refresh(&rotated.refresh_token).await.is_err());
}

#[tokio::test]
async fn test_unknown_refresh_token_is_rejected() {
    let (_, service) = setup().await;

    let err = service.refresh("never-issued").await.unwrap_err();
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let (_, service) = setup().await;
    let pair = service.issue("user-1").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(async move { service.refresh(&token).await }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_signature_rotation_voids_old_references() {
    let (users, service) = setup().await;

    let old_signature = users.get_by_id("user-1").await.unwrap().signature;
    let pair = service.issue("user-1").await.unwrap();

    users
        .change_password("user-1", "new-hash", "fresh-signature")
        .await
        .unwrap();

    let err = service
        .issue(&format!("user-1;{}", old_signature))
        .await
        .unwrap_err();
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);

    // Refresh tokens issued before the change carry the old signature
    let err = service.refresh(&pair.refresh_token).await.unwrap_err();
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);

    assert!(service.issue("user-1;fresh-signature").await.is_ok());
    assert!(service.issue("user-1;FRESH-SIGNATURE").await.is_ok());
}

#[tokio::test]
async fn test_extra_separators_never_match() {
    let (users, service) = setup().await;
    let signature = users.get_by_id("user-1").await.unwrap().signature;

    let err = service
        .issue(&format!("user-1;{};extra", signature))
        .await
        .unwrap_err();
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);
}

#[tokio::test]
async fn test_unknown_user() {
    let (_, service) = setup().await;

    let err = service.issue("ghost").await.unwrap_err();
    assert!(matches!(err, TokenGateError::NotFound { .. }));

    let err = service.issue("ghost;whatever").await.unwrap_err();
    assert_eq!(err.message(), INVALID_REFRESH_TOKEN);

    assert!(service.issue(";signature").await.is_err());
}

#[tokio::test]
async fn test_expired_access_token_is_unauthorized() {
    let (_, service) = setup().await;

    let issued_at = Utc::now() - Duration::hours(2);
    let claims = AccessClaims::new("user-1", "manager", issued_at, Duration::minutes(5)).unwrap();
    let token = service.token_manager().sign(&claims).unwrap();

    let err = service.authenticate(&token).await.unwrap_err();
    assert!(matches!(err, TokenGateError::Unauthorized { .. }));
    assert_eq!(err.message(), "Invalid or expired JWT");
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let (_, service) = setup().await;

    let other = GateConfig::new("Kp4-another-signing-key-0b9d8e7f6a5c").unwrap();
    let (users, _) = setup().await;
    let foreign = TokenService::new(
        &other,
        users,
        Arc::new(MemoryStore::new("refresh-token")),
        Arc::new(MemoryStore::new("revocation")),
    );
    let pair = foreign.issue("user-1").await.unwrap();

    assert!(service.authenticate(&pair.access_token).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_revocation_marker_lasts_for_leeway_past_expiry() {
    let (_, service) = setup().await;

    // Already expired, so only the verifier's leeway remains
    service
        .revoke("expired-token-id", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    tokio::time::advance(std::time::Duration::from_secs(59)).await;
    assert!(service.check_revoked("expired-token-id").await.is_err());

    tokio::time::advance(std::time::Duration::from_secs(2)).await;
    assert!(service.check_revoked("expired-token-id").await.is_ok());
}

#[tokio::test]
async fn test_unrepresentable_lifetime_fails_without_panicking() {
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .insert(UserRecord::new("user-1", "alice", "manager", "unused-hash"))
        .await;

    let far_future = Duration::days(365 * 1_000_000);
    for config in [
        GateConfig::new(SIGNING_KEY).unwrap().with_access_token_ttl(far_future),
        GateConfig::new(SIGNING_KEY).unwrap().with_refresh_token_ttl(far_future),
    ] {
        let service = TokenService::new(
            &config,
            users.clone(),
            Arc::new(MemoryStore::new("refresh-token")),
            Arc::new(MemoryStore::new("revocation")),
        );
        let err = service.issue("user-1").await.unwrap_err();
        assert!(matches!(err, TokenGateError::Unexpected { .. }));
        assert_eq!(err.status(), 500);
    }
}

const STORE_DOWN: &str = "connection refused by store backend";

/// Memory store whose operations can be switched to fail
struct FlakyStore {
    inner: MemoryStore,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new("flaky"),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        })
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(TokenGateError::unexpected(STORE_DOWN));
        }
        Ok(())
    }
}

#[async_trait]
impl ExpiringStore for FlakyStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        Self::check(&self.fail_set)?;
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Self::check(&self.fail_get)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Self::check(&self.fail_delete)?;
        self.inner.delete(key).await
    }
}

async fn flaky_setup() -> (Arc<FlakyStore>, Arc<FlakyStore>, TokenService) {
    let config = GateConfig::new(SIGNING_KEY).unwrap();
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .insert(UserRecord::new("user-1", "alice", "manager", "unused-hash"))
        .await;

    let refresh_store = FlakyStore::new();
    let revocation_store = FlakyStore::new();
    let service = TokenService::new(
        &config,
        users,
        refresh_store.clone(),
        revocation_store.clone(),
    );
    (refresh_store, revocation_store, service)
}

fn assert_internal(err: &TokenGateError) {
    assert!(matches!(err, TokenGateError::Unexpected { .. }));
    assert_eq!(err.status(), 500);
    assert_eq!(err.code(), "internal-server-error");
    assert_eq!(err.cause(), Some(STORE_DOWN));

    let body = serde_json::to_string(&err.to_body()).unwrap();
    assert!(!body.contains(STORE_DOWN));
}

#[tokio::test]
async fn test_store_failure_on_issue() {
    let (refresh_store, _, service) = flaky_setup().await;
    refresh_store.fail_set.store(true, Ordering::SeqCst);

    let err = service.issue("user-1").await.unwrap_err();
    assert_internal(&err);
}

#[tokio::test]
async fn test_store_failure_on_refresh_lookup() {
    let (refresh_store, _, service) = flaky_setup().await;
    let pair = service.issue("user-1").await.unwrap();
    refresh_store.fail_get.store(true, Ordering::SeqCst);

    let err = service.refresh(&pair.refresh_token).await.unwrap_err();
    assert_internal(&err);
}

#[tokio::test]
async fn test_failed_delete_does_not_issue() {
    let (refresh_store, _, service) = flaky_setup().await;
    let pair = service.issue("user-1").await.unwrap();
    assert_eq!(refresh_store.inner.len().await, 1);

    refresh_store.fail_delete.store(true, Ordering::SeqCst);
    let err = service.refresh(&pair.refresh_token).await.unwrap_err();
    assert_internal(&err);

    // No replacement record was written
    assert_eq!(refresh_store.inner.len().await, 1);
    assert!(refresh_store.inner.get(&pair.refresh_token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_failure_on_revocation() {
    let (_, revocation_store, service) = flaky_setup().await;

    revocation_store.fail_set.store(true, Ordering::SeqCst);
    let err = service
        .revoke("token-id", Utc::now() + Duration::minutes(5))
        .await
        .unwrap_err();
    assert_internal(&err);

    revocation_store.fail_get.store(true, Ordering::SeqCst);
    let err = service.check_revoked("token-id").await.unwrap_err();
    assert_internal(&err);
}
