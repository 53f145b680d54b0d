//! Authentication and authorization module

pub mod authorize;
pub mod claims;
pub mod context;
pub mod password;
pub mod token;
pub mod user;

// Re-export main components
pub use authorize::{authorize, Requirement};
pub use claims::{AccessClaims, TokenReference};
pub use context::IdentityContext;
pub use password::{Argon2Hasher, PasswordHasher};
pub use token::{extract_bearer_token, TokenManager};
pub use user::{MemoryUserDirectory, SharedUserDirectory, UserDirectory, UserRecord};
