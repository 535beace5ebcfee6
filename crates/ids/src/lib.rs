//! Identifier types for the clinic workspace.
//!
//! Two kinds of identifier exist:
//!
//! - [`RecordId`] names users, doctors and reservations. It uses a *canonical* UUID
//!   representation: **32 lowercase hexadecimal characters** (no hyphens), the same value as
//!   `Uuid::new_v4().simple().to_string()`. Externally supplied identifiers must already be
//!   canonical; hyphenated or uppercase forms are rejected rather than normalised.
//! - [`TokenId`] names a session token. It is 256 bits drawn from the operating system RNG and
//!   rendered as 64 lowercase hex characters. Token ids are bearer credentials, so they are
//!   never derived from anything guessable.

mod record;
mod token;

pub use record::{RecordId, Uuid};
pub use token::TokenId;

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
