use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{Result, TokenGateError};

/// Password hashing collaborator
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string
    fn hash_password(&self, plain: &str) -> Result<String>;

    /// Check a plaintext password against a stored hash.
    /// A malformed hash is an error; a mismatch is `Ok(false)`.
    fn verify_password(&self, plain: &str, hashed: &str) -> Result<bool>;
}

/// Argon2id hasher producing PHC strings (`$argon2id$v=19$m=...`)
#[derive(Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(TokenGateError::unexpected)
    }

    fn verify_password(&self, plain: &str, hashed: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hashed).map_err(TokenGateError::unexpected)?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("correct horse", &hash).unwrap());
        assert!(!hasher.verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_salted() {
        let hasher = Argon2Hasher::new();
        assert_ne!(
            hasher.hash_password("same").unwrap(),
            hasher.hash_password("same").unwrap()
        );
    }

    #[test]
    fn test_malformed_hash_is_error() {
        let hasher = Argon2Hasher::new();
        let err = hasher.verify_password("pw", "not-a-phc-string").unwrap_err();
        assert_eq!(err.code(), "internal-server-error");
    }
}
