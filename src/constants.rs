// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const API_PREFIX: &str = "api";
pub const API_VERSION: &str = "v1";

// Token lifetimes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 5 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Upper bound accepted for either configured lifetime (30 days)
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// Lifetime of a password reset link
pub const RESET_LINK_TTL_SECS: i64 = 12 * 60 * 60;

/// Clock skew accepted by the access token validator, in seconds
pub const TOKEN_LEEWAY_SECS: u64 = 60;

/// Random bytes behind each refresh token value
pub const REFRESH_TOKEN_BYTES: usize = 32;

// Store maintenance
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MIN_AUTH_MILLIS: u64 = 100;

// HTTP surface
pub const REFRESH_COOKIE_NAME: &str = "tokengate.refresh-token";
pub const CONTEXT_ID_HEADER: &str = "Context-ID";
pub const MAX_BEARER_TOKEN_LEN: usize = 4096;
/// Path the reset id is appended to in emailed links
pub const RESET_LINK_PATH: &str = "/app/reset-password";

// Outgoing mail
pub const DEFAULT_EMAIL_SENDER: &str = "no-reply@tokengate.local";
pub const DEFAULT_EMAIL_SENDER_NAME: &str = "TokenGate (No Reply)";
