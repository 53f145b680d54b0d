use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::claims::{AccessClaims, TokenReference};
use crate::auth::context::IdentityContext;
use crate::auth::password::PasswordHasher;
use crate::auth::user::{new_signature, SharedUserDirectory};
use crate::config::GateConfig;
use crate::constants::{RESET_LINK_PATH, RESET_LINK_TTL_SECS};
use crate::error::{Result, TokenGateError};
use crate::mailer::{EmailInfo, Mail, SharedMailer};
use crate::security::AuthTimer;
use crate::services::token::{TokenPair, TokenService};
use crate::storage::{ResetLinkStore, SharedStore};

const WRONG_CREDENTIALS: &str = "wrong username or password";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username_or_email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

/// New password for the account a reset id was issued to
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResetPasswordRequest {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub password: String,
}

/// Credential-facing flows layered on the token service
pub struct AuthService {
    users: SharedUserDirectory,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
    reset_links: ResetLinkStore,
    mailer: SharedMailer,
    sender: EmailInfo,
    public_url: String,
    min_auth_duration: Duration,
}

impl AuthService {
    pub fn new(
        config: &GateConfig,
        users: SharedUserDirectory,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenService>,
        reset_store: SharedStore,
        mailer: SharedMailer,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
            reset_links: ResetLinkStore::new(reset_store),
            mailer,
            sender: EmailInfo::new(&config.email_sender_name, &config.email_sender),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            min_auth_duration: config.min_auth_duration,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Check credentials and issue a fresh token pair.
    ///
    /// Unknown accounts and wrong passwords fail identically, padded to the
    /// same minimum duration.
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair> {
        if request.username_or_email.trim().is_empty() || request.password.is_empty() {
            return Err(TokenGateError::bad_request(
                "usernameOrEmail and password are required",
            ));
        }

        let timer = AuthTimer::start(self.min_auth_duration);

        let user = match self.users.find_by_login(request.username_or_email.trim()).await {
            Ok(user) => user,
            Err(TokenGateError::NotFound { .. }) => {
                timer.wait().await;
                return Err(TokenGateError::unauthorized(WRONG_CREDENTIALS));
            }
            Err(e) => return Err(e),
        };

        let hasher = Arc::clone(&self.hasher);
        let password = request.password;
        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(TokenGateError::unexpected)??;

        if !verified {
            log::warn!("Failed login for user {}", user.id);
            timer.wait().await;
            return Err(TokenGateError::unauthorized(WRONG_CREDENTIALS));
        }

        self.tokens.issue_for(&TokenReference::login(user.id.as_str())).await
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair> {
        let token = request.refresh_token.trim();
        if token.is_empty() {
            return Err(TokenGateError::bad_request("Missing refresh token"));
        }
        self.tokens.refresh(token).await
    }

    /// Revoke the access token described by `claims`
    pub async fn logout(&self, claims: &AccessClaims) -> Result<()> {
        self.tokens.revoke(&claims.jti, claims.expires_at()).await?;
        log::info!("User {} logged out", claims.sub);
        Ok(())
    }

    /// Set a new password and rotate the user's signature.
    ///
    /// Every outstanding refresh token of the user stops working. Access
    /// tokens already issued stay valid until they expire or are revoked.
    pub async fn change_password(
        &self,
        identity: Option<&IdentityContext>,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        let identity = identity.ok_or_else(TokenGateError::missing_context)?;
        if identity.is_anonymous() {
            return Err(TokenGateError::unauthorized_default());
        }
        if request.password.is_empty() {
            return Err(TokenGateError::bad_request("password is required"));
        }

        let user = self.users.get_by_id(identity.user_id()).await.map_err(|e| match e {
            TokenGateError::NotFound { .. } => TokenGateError::unexpected(e),
            other => other,
        })?;

        self.set_password(&user.id, request.password).await?;
        log::info!(
            "Password changed for user {}, outstanding refresh tokens invalidated",
            user.id
        );
        Ok(())
    }

    /// Email a single-use reset link to the account behind `email`.
    ///
    /// Succeeds without sending anything when no account matches, so the
    /// response never reveals which addresses are registered.
    pub async fn send_reset_password(&self, request: SendResetPasswordRequest) -> Result<()> {
        let email = request.email.trim();
        if !is_plausible_email(email) {
            return Err(TokenGateError::bad_request("a valid email is required"));
        }

        let timer = AuthTimer::start(self.min_auth_duration);

        let found = match self.users.find_by_login(email).await {
            Ok(user) => user.email.clone().map(|address| (user, address)),
            Err(TokenGateError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        let (user, address) = match found {
            Some(found) => found,
            None => {
                log::debug!("Password reset requested for an unknown address");
                timer.wait().await;
                return Ok(());
            }
        };

        let ttl = chrono::Duration::seconds(RESET_LINK_TTL_SECS);
        let id = self.reset_links.create(&user.id, ttl).await?;
        let link = format!("{}{}/{}", self.public_url, RESET_LINK_PATH, id);

        let mail = Mail {
            from: self.sender.clone(),
            to: vec![EmailInfo::new(&user.username, address)],
            subject: "Password Recovery".to_string(),
            plain_text: format!(
                "Dear {},\nPassword reset link: {}\nAtt. {}",
                user.username, link, self.sender.name
            ),
        };
        self.mailer.send(mail).await.map_err(|e| match e {
            e @ TokenGateError::Unexpected { .. } => e,
            other => TokenGateError::unexpected(other),
        })?;

        log::info!("Password reset link sent to user {}", user.id);
        Ok(())
    }

    /// Redeem a reset id: set the new password and rotate the signature.
    ///
    /// The id works once. Outstanding refresh tokens of the user stop working.
    pub async fn verify_reset_password(&self, request: VerifyResetPasswordRequest) -> Result<()> {
        if request.id.trim().is_empty() || request.password.is_empty() {
            return Err(TokenGateError::bad_request("id and password are required"));
        }

        let user_id = self
            .reset_links
            .consume(request.id.trim())
            .await?
            .ok_or_else(|| TokenGateError::bad_request("reset code expired"))?;

        // The account vanished between request and redemption
        let user = self.users.get_by_id(&user_id).await.map_err(TokenGateError::unexpected)?;

        self.set_password(&user.id, request.password).await?;
        log::info!(
            "Password reset for user {}, outstanding refresh tokens invalidated",
            user.id
        );
        Ok(())
    }

    /// Hash off the async runtime, then store the hash with a new signature
    async fn set_password(&self, user_id: &str, password: String) -> Result<()> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(TokenGateError::unexpected)??;

        self.users.change_password(user_id, &hash, &new_signature()).await
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("alice@example.com"));
        assert!(is_plausible_email("a.b+tag@mail.example.org"));

        for bad in ["", "alice", "@example.com", "alice@", "alice@example", "alice@.com", "a lice@example.com"] {
            assert!(!is_plausible_email(bad), "{}", bad);
        }
    }
}
