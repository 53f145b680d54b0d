use serde::Serialize;
use std::error::Error;
use std::fmt;

/// How loudly an error should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGateError {
    // Client errors, surfaced verbatim and never retried
    BadRequest { message: String },
    Unauthorized { message: String },
    NotFound { message: String },

    // Access denial (revoked token, unmet role or permission)
    Forbidden { message: String },

    // No identity resolved where one was required: the pipeline is misordered
    MissingContext { message: String },

    // Configuration errors
    Config { message: String },

    // Store, signing or hashing failures. `cause` is for logs only.
    Unexpected { message: String, cause: String },
}

impl TokenGateError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn unauthorized_default() -> Self {
        Self::unauthorized("You need to login first")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn missing_context() -> Self {
        Self::MissingContext {
            message: "Request identity has not been resolved".to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Wraps an internal failure behind a generic message
    pub fn unexpected(cause: impl fmt::Display) -> Self {
        Self::Unexpected {
            message: "Something went wrong".to_string(),
            cause: cause.to_string(),
        }
    }

    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::MissingContext { .. } | Self::Config { .. } | Self::Unexpected { .. } => 500,
        }
    }

    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad-request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not-found",
            Self::MissingContext { .. } => "missing-context",
            Self::Config { .. } => "configuration-error",
            Self::Unexpected { .. } => "internal-server-error",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::BadRequest { .. } | Self::NotFound { .. } => Severity::Info,
            Self::Unauthorized { .. } | Self::Forbidden { .. } => Severity::Warn,
            Self::MissingContext { .. } | Self::Unexpected { .. } => Severity::Error,
            Self::Config { .. } => Severity::Fatal,
        }
    }

    /// Human readable message, safe to show to callers
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::Forbidden { message }
            | Self::MissingContext { message }
            | Self::Config { message }
            | Self::Unexpected { message, .. } => message,
        }
    }

    /// The wrapped internal cause, if any
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Unexpected { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Wire form of the error. Never carries the internal cause.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status(),
            code: self.code(),
            message: self.message().to_string(),
            severity: self.severity(),
        }
    }
}

impl fmt::Display for TokenGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unexpected { message, cause } => write!(f, "{}: {}", message, cause),
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            other => write!(f, "{}", other.message()),
        }
    }
}

impl Error for TokenGateError {}

impl warp::reject::Reject for TokenGateError {}

/// JSON body returned to callers for every failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
}

// Generic result type for TokenGate
pub type Result<T> = std::result::Result<T, TokenGateError>;
