//! Per-role session tokens.
//!
//! A user may hold one live token per role at the same time. Tokens for different roles are
//! independent; issuing a new token for a role replaces (revokes) the previous token for that
//! role only.

pub mod broker;
pub mod store;
pub mod token;
pub mod verifier;

pub use broker::{sweep_expired_sessions, SessionBroker};
pub use store::{InMemoryTokenStore, TokenStore};
pub use token::SessionToken;
pub use verifier::{CredentialProof, CredentialVerifier, DirectoryVerifier, Verification, VerifierError};
