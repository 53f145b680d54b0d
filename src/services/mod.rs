//! Token and credential services

pub mod auth;
pub mod token;

pub use auth::{
    AuthService, ChangePasswordRequest, LoginRequest, RefreshRequest, SendResetPasswordRequest,
    VerifyResetPasswordRequest,
};
pub use token::{TokenPair, TokenService};
