use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TokenGateError};

/// Message shared by every refresh failure so callers cannot tell
/// a missing record from a signature mismatch.
pub const INVALID_REFRESH_TOKEN: &str = "invalid or expired refresh token";

/// JWT claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Token ID, the revocation handle
    pub jti: String,
    /// Issued at (UTC timestamp, seconds)
    pub iat: i64,
    /// Not before (UTC timestamp, seconds)
    pub nbf: i64,
    /// Expiration time (UTC timestamp, seconds)
    pub exp: i64,
    /// The user's role at issuance
    pub role: String,
}

impl AccessClaims {
    /// Creates claims for a user, valid from `now` for `ttl`, with a fresh token id.
    ///
    /// Fails with `Unexpected` if `now + ttl` is not representable.
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Result<Self> {
        let iat = now.timestamp();
        let exp = expiry_after(now, ttl)?;
        Ok(Self {
            sub: user_id.into(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            nbf: iat,
            exp: exp.timestamp(),
            role: role.into(),
        })
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.iat)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.exp)
    }

    /// Check if the token is expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

/// `now + ttl`, or `Unexpected` when it overflows the calendar
pub fn expiry_after(now: DateTime<Utc>, ttl: chrono::Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| TokenGateError::unexpected(format!("token lifetime {} overflows", ttl)))
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// What an issuance is keyed on: a bare user id on login,
/// or `userID;signature` when replaying a stored refresh record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenReference {
    Login { user_id: String },
    Refresh { user_id: String, signature: String },
}

impl TokenReference {
    pub fn login(user_id: impl Into<String>) -> Self {
        Self::Login { user_id: user_id.into() }
    }

    pub fn refresh(user_id: impl Into<String>, signature: impl Into<String>) -> Self {
        Self::Refresh {
            user_id: user_id.into(),
            signature: signature.into(),
        }
    }

    /// Parse `userID` or `userID;signature`. Only the first `;` separates;
    /// anything after it is the signature and must match verbatim.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(';') {
            Some((user_id, _)) if user_id.is_empty() => {
                Err(TokenGateError::bad_request(INVALID_REFRESH_TOKEN))
            }
            Some((user_id, signature)) => Ok(Self::refresh(user_id, signature)),
            None if raw.is_empty() => Err(TokenGateError::bad_request("user id is required")),
            None => Ok(Self::login(raw)),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Login { user_id } | Self::Refresh { user_id, .. } => user_id,
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Login { .. } => None,
            Self::Refresh { signature, .. } => Some(signature),
        }
    }
}

impl fmt::Display for TokenReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { user_id } => f.write_str(user_id),
            Self::Refresh { user_id, signature } => write!(f, "{};{}", user_id, signature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_lifetime() {
        let now = Utc::now();
        let claims = AccessClaims::new("user-1", "tech", now, chrono::Duration::minutes(5)).unwrap();
        assert_eq!(claims.exp - claims.iat, 300);
        assert_eq!(claims.nbf, claims.iat);
        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + chrono::Duration::minutes(6)));
    }

    #[test]
    fn test_each_issuance_gets_a_fresh_id() {
        let now = Utc::now();
        let a = AccessClaims::new("u", "r", now, chrono::Duration::minutes(5)).unwrap();
        let b = AccessClaims::new("u", "r", now, chrono::Duration::minutes(5)).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_overflowing_lifetime_is_an_error() {
        let ttl = chrono::Duration::days(365 * 1_000_000);
        let err = AccessClaims::new("u", "r", Utc::now(), ttl).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.code(), "internal-server-error");
        assert!(expiry_after(Utc::now(), chrono::Duration::minutes(5)).is_ok());
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(TokenReference::parse("abc").unwrap(), TokenReference::login("abc"));
        assert_eq!(
            TokenReference::parse("abc;sig").unwrap(),
            TokenReference::refresh("abc", "sig")
        );
        // Extra separators stay in the signature so they can never match
        assert_eq!(
            TokenReference::parse("abc;sig;more").unwrap().signature(),
            Some("sig;more")
        );
        assert!(TokenReference::parse("").is_err());
        assert!(TokenReference::parse(";sig").is_err());
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(TokenReference::refresh("u1", "s1").to_string(), "u1;s1");
        assert_eq!(TokenReference::login("u1").to_string(), "u1");
    }
}
