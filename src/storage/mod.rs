//! Expiring key-value storage backing refresh tokens, revocations and reset links

pub mod memory;
pub mod refresh;
pub mod reset;
pub mod token_revocation;
pub mod traits;

pub use memory::MemoryStore;
pub use refresh::RefreshTokenStore;
pub use reset::ResetLinkStore;
pub use token_revocation::RevocationList;
pub use traits::{ExpiringStore, SharedStore};
