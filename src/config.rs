//! Service configuration module
//! Handles environment driven parameters for the token service and its HTTP surface

use crate::constants::{
    ACCESS_TOKEN_TTL_SECS, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_EMAIL_SENDER,
    DEFAULT_EMAIL_SENDER_NAME, DEFAULT_HOST, DEFAULT_MIN_AUTH_MILLIS, DEFAULT_PORT,
    MAX_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS,
};
use crate::error::{Result, TokenGateError};
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Deployment environment, selects which `.env` file is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DEV" | "DEVELOPMENT" => Ok(Self::Dev),
            "STAGING" => Ok(Self::Staging),
            "PRODUCTION" | "PROD" => Ok(Self::Production),
            other => Err(TokenGateError::config(format!(
                "unknown environment '{}', expected DEV, STAGING or PRODUCTION",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Staging => "STAGING",
            Self::Production => "PRODUCTION",
        }
    }

    fn env_file_name(&self) -> String {
        match self {
            Self::Dev => ".env".to_string(),
            other => format!(".{}.env", other.as_str()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service configuration parameters
#[derive(Clone)]
pub struct GateConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Build version reported by the health endpoint
    pub version: String,
    /// Shared secret for access token signing/validation
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    /// How often expired store records are swept
    pub store_cleanup_interval: Duration,
    /// Minimum time a failed login takes
    pub min_auth_duration: Duration,
    /// Optional JSON file seeding the in-memory user directory
    pub users_file: Option<String>,
    /// Base URL placed in emailed links, without a trailing slash
    pub public_url: String,
    pub email_sender: String,
    pub email_sender_name: String,
}

// Keep the secret out of logs
impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("version", &self.version)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("store_cleanup_interval", &self.store_cleanup_interval)
            .field("min_auth_duration", &self.min_auth_duration)
            .field("users_file", &self.users_file)
            .field("public_url", &self.public_url)
            .field("email_sender", &self.email_sender)
            .field("email_sender_name", &self.email_sender_name)
            .finish()
    }
}

impl GateConfig {
    /// Build a configuration with defaults around a validated secret
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self> {
        let jwt_secret = jwt_secret.into();
        Self::validate_jwt_secret(&jwt_secret)?;

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: Environment::Dev,
            version: env!("CARGO_PKG_VERSION").to_string(),
            jwt_secret,
            access_token_ttl: chrono::Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: chrono::Duration::seconds(REFRESH_TOKEN_TTL_SECS),
            store_cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            min_auth_duration: Duration::ZERO,
            users_file: None,
            public_url: format!("http://localhost:{}", DEFAULT_PORT),
            email_sender: DEFAULT_EMAIL_SENDER.to_string(),
            email_sender_name: DEFAULT_EMAIL_SENDER_NAME.to_string(),
        })
    }

    pub fn with_access_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_min_auth_duration(mut self, duration: Duration) -> Self {
        self.min_auth_duration = duration;
        self
    }

    /// Validate that the signing secret meets security requirements
    fn validate_jwt_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(TokenGateError::config(
                "JWT secret must be at least 32 characters long",
            ));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "change-me",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];

        let lowered = secret.to_ascii_lowercase();
        for pattern in &insecure_patterns {
            if lowered.contains(pattern) {
                return Err(TokenGateError::config(format!(
                    "JWT secret contains insecure pattern '{}'. Please use a secure random value generated with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TokenGateError::config(
                "JWT secret should contain mixed characters (letters, numbers, symbols)",
            ));
        }

        Ok(())
    }

    /// Load `.env` files for the selected environment, then read the process environment.
    ///
    /// Values already present in the environment are never overridden by the files.
    pub fn load(base_dir: impl AsRef<Path>) -> Result<Self> {
        let environment = env::var("TOKENGATE_ENVIRONMENT")
            .ok()
            .map(|v| Environment::parse(&v))
            .transpose()?
            .unwrap_or(Environment::Dev);

        let path = base_dir.as_ref().join(environment.env_file_name());
        match dotenvy::from_path(&path) {
            Ok(()) => log::info!("Environment variables loaded from {}", path.display()),
            Err(e) => log::warn!("Failed to load {}: {}", path.display(), e),
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_or = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    TokenGateError::config(format!("{} must be a positive integer, got '{}'", key, raw))
                }),
                None => Ok(default),
            }
        };

        let jwt_secret = lookup("TOKENGATE_JWT_SECRET")
            .or_else(|| lookup("JWT_SECRET"))
            .ok_or_else(|| {
                TokenGateError::config(
                    "JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32",
                )
            })?;

        let mut config = Self::new(jwt_secret)?;

        if let Some(host) = lookup("TOKENGATE_HOST") {
            config.host = host;
        }
        config.port = u16::try_from(parse_or("TOKENGATE_PORT", DEFAULT_PORT as u64)?)
            .map_err(|_| TokenGateError::config("TOKENGATE_PORT is out of range"))?;

        if let Some(environment) = lookup("TOKENGATE_ENVIRONMENT") {
            config.environment = Environment::parse(&environment)?;
        }
        if let Some(version) = lookup("TOKENGATE_VERSION") {
            config.version = version;
        }

        let access_secs = parse_or("TOKENGATE_ACCESS_TTL_SECS", ACCESS_TOKEN_TTL_SECS as u64)?;
        let refresh_secs = parse_or("TOKENGATE_REFRESH_TTL_SECS", REFRESH_TOKEN_TTL_SECS as u64)?;
        if access_secs == 0 || refresh_secs == 0 {
            return Err(TokenGateError::config("token lifetimes must be greater than zero"));
        }
        if access_secs > MAX_TOKEN_TTL_SECS || refresh_secs > MAX_TOKEN_TTL_SECS {
            return Err(TokenGateError::config(format!(
                "token lifetimes must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }
        config.access_token_ttl = chrono::Duration::seconds(access_secs as i64);
        config.refresh_token_ttl = chrono::Duration::seconds(refresh_secs as i64);

        let cleanup_secs = parse_or("TOKENGATE_CLEANUP_INTERVAL_SECS", DEFAULT_CLEANUP_INTERVAL_SECS)?;
        config.store_cleanup_interval = Duration::from_secs(cleanup_secs.max(1));

        let default_auth_millis = match config.environment {
            Environment::Dev => 0,
            _ => DEFAULT_MIN_AUTH_MILLIS,
        };
        config.min_auth_duration =
            Duration::from_millis(parse_or("TOKENGATE_MIN_AUTH_MILLIS", default_auth_millis)?);

        config.users_file = lookup("TOKENGATE_USERS_FILE").filter(|p| !p.trim().is_empty());

        config.public_url = match lookup("TOKENGATE_PUBLIC_URL") {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", config.port),
        };
        if let Some(sender) = lookup("EMAIL_SENDER").filter(|s| !s.trim().is_empty()) {
            config.email_sender = sender;
        }
        if let Some(name) = lookup("EMAIL_SENDER_NAME").filter(|s| !s.trim().is_empty()) {
            config.email_sender_name = name;
        }

        Ok(config)
    }
}
