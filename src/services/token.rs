//! Access token issuance, refresh token rotation and revocation
//!
//! The service holds no mutable state of its own. Refresh records and
//! revocation markers live in expiring stores and are read fresh on every call,
//! so one instance can be shared by every request task. Each await point is a
//! store or user-directory call; dropping the future there cancels the
//! operation. A refresh record written for a response that never reached the
//! caller is harmless: it simply expires unused.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::sync::Arc;

use crate::auth::claims::{expiry_after, AccessClaims, TokenReference, INVALID_REFRESH_TOKEN};
use crate::auth::token::TokenManager;
use crate::auth::user::SharedUserDirectory;
use crate::config::GateConfig;
use crate::constants::{REFRESH_TOKEN_BYTES, TOKEN_LEEWAY_SECS};
use crate::error::{Result, TokenGateError};
use crate::security::constant_time_eq_ignore_case;
use crate::storage::{RefreshTokenStore, RevocationList, SharedStore};

/// Tokens handed to a client after login or refresh
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenService {
    tokens: Arc<TokenManager>,
    users: SharedUserDirectory,
    refresh_tokens: RefreshTokenStore,
    revocations: RevocationList,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(
        config: &GateConfig,
        users: SharedUserDirectory,
        refresh_store: SharedStore,
        revocation_store: SharedStore,
    ) -> Self {
        Self {
            tokens: Arc::new(TokenManager::new(&config.jwt_secret)),
            users,
            refresh_tokens: RefreshTokenStore::new(refresh_store),
            revocations: RevocationList::new(revocation_store),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Issue tokens for `reference`, either `userID` or `userID;signature`
    pub async fn issue(&self, reference: &str) -> Result<TokenPair> {
        let reference = TokenReference::parse(reference)?;
        self.issue_for(&reference).await
    }

    /// Issue a signed access token and store a fresh refresh token.
    ///
    /// A `Refresh` reference must carry the user's current signature; a
    /// mismatch or a vanished user fails with the same client error as an
    /// unknown refresh token.
    pub async fn issue_for(&self, reference: &TokenReference) -> Result<TokenPair> {
        let user = match self.users.get_by_id(reference.user_id()).await {
            Ok(user) => user,
            Err(TokenGateError::NotFound { .. }) if reference.signature().is_some() => {
                log::warn!("Refresh rejected: user {} no longer exists", reference.user_id());
                return Err(invalid_refresh_token());
            }
            Err(e) => return Err(e),
        };

        if let Some(signature) = reference.signature() {
            if !constant_time_eq_ignore_case(signature, &user.signature) {
                log::warn!("Refresh rejected: stale signature for user {}", user.id);
                return Err(invalid_refresh_token());
            }
        }

        let now = Utc::now();
        let claims = AccessClaims::new(user.id.as_str(), user.role.as_str(), now, self.access_ttl)?;
        let refresh_expires_at = expiry_after(now, self.refresh_ttl)?;
        let access_token = self.tokens.sign(&claims)?;

        let refresh_token = generate_refresh_token();
        let refresh_reference = TokenReference::refresh(user.id.as_str(), user.signature.as_str());
        self.refresh_tokens
            .save(&refresh_token, &refresh_reference, self.refresh_ttl)
            .await?;

        log::info!("Issued access token {} for user {}", claims.jti, user.id);

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: claims.expires_at(),
            refresh_expires_at,
        })
    }

    /// Exchange a refresh token for a new pair. The token is consumed first,
    /// so it can succeed at most once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let reference = self
            .refresh_tokens
            .consume(refresh_token)
            .await?
            .ok_or_else(|| {
                log::warn!("Refresh rejected: unknown, expired or reused refresh token");
                invalid_refresh_token()
            })?;

        self.issue_for(&reference).await
    }

    /// Deny `token_id` until the token itself could no longer verify.
    ///
    /// The marker outlives `expires_at` by the verifier's clock-skew leeway;
    /// an `expires_at` in the past still records a marker for that window.
    /// The marker lives exactly as long as the token's verifiable lifetime,
    /// `exp + leeway`, and no longer.
    pub async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let remaining = (expires_at - Utc::now()).max(chrono::Duration::zero());
        let ttl = remaining + chrono::Duration::seconds(TOKEN_LEEWAY_SECS as i64);
        self.revocations.revoke(token_id, ttl).await
    }

    /// `Forbidden` if `token_id` has been revoked
    pub async fn check_revoked(&self, token_id: &str) -> Result<()> {
        if self.revocations.is_revoked(token_id).await? {
            log::warn!("Rejected revoked token {}", token_id);
            return Err(TokenGateError::forbidden("Token has been revoked"));
        }
        Ok(())
    }

    /// Verify a bearer token and make sure it has not been revoked
    pub async fn authenticate(&self, token: &str) -> Result<AccessClaims> {
        let claims = self.tokens.verify(token)?;
        self.check_revoked(&claims.jti).await?;
        Ok(claims)
    }
}

fn invalid_refresh_token() -> TokenGateError {
    TokenGateError::bad_request(INVALID_REFRESH_TOKEN)
}

/// URL-safe random refresh token value
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_tokens_are_random_and_url_safe() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!a.contains(';'));
    }
}
