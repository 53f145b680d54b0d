//! TokenGate - access and refresh token core for HTTP services
//!
//! This library issues short-lived JWT access tokens, rotates single-use
//! refresh tokens, revokes tokens by id, and evaluates role and permission
//! requirements against a per-request identity.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod routes;
pub mod security;
pub mod services;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{Result, TokenGateError};
