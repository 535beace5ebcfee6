//! Credential verification seam.
//!
//! The broker treats credential checking as a call to a possibly slow, possibly failing
//! upstream. Implementations report a definite answer ([`Verification`]) or an inability to
//! answer ([`VerifierError`]); the broker owns timeouts and retries.

use crate::directory::{IdentityRepository, PasswordDigest};
use crate::identity::Identity;
use async_trait::async_trait;
use clinic_types::EmailAddress;
use std::sync::Arc;

/// Secret presented alongside an email. `Debug` never prints the secret.
#[derive(Clone)]
pub struct CredentialProof(String);

impl CredentialProof {
    pub fn password(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CredentialProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialProof(***)")
    }
}

/// Definite outcome of a verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    Verified(Identity),
    Rejected,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum VerifierError {
    #[error("credential verifier unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        email: &EmailAddress,
        proof: &CredentialProof,
    ) -> Result<Verification, VerifierError>;
}

/// Verifies passwords against an [`IdentityRepository`].
#[derive(Clone)]
pub struct DirectoryVerifier {
    accounts: Arc<dyn IdentityRepository>,
}

impl DirectoryVerifier {
    pub fn new(accounts: Arc<dyn IdentityRepository>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryVerifier {
    async fn verify(
        &self,
        email: &EmailAddress,
        proof: &CredentialProof,
    ) -> Result<Verification, VerifierError> {
        match self.accounts.find_by_email(email) {
            Some(account) if account.password.matches(proof.expose()) => {
                Ok(Verification::Verified(account.identity()))
            }
            Some(_) => Ok(Verification::Rejected),
            None => {
                // Spend the same hashing work for unknown emails.
                let _ = PasswordDigest::with_salt("", proof.expose());
                Ok(Verification::Rejected)
            }
        }
    }
}
