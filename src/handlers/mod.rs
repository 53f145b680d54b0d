//! Request handlers and the filters they run behind

pub mod auth;
pub mod identity;
pub mod rejection;

pub use identity::{authorized, require_identity, with_context, with_identity, with_state};
pub use rejection::{handle_rejection, reject, Rejected};
