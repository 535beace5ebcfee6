//! Session issuance, validation and revocation.
//!
//! [`SessionBroker`] is a stateless handler over an injected [`TokenStore`],
//! [`CredentialVerifier`] and [`Clock`]. The only serialised write is
//! [`TokenStore::install`], keyed by `(user, role)`; validation is a plain read.
//!
//! Upstream handling:
//! - the verifier is called under `verifier_timeout`; a timeout or an `Unavailable` answer is
//!   retried once after `upstream_backoff`, then surfaces as `UpstreamUnavailable`.
//! - a failed store call is retried once immediately.

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, StoreResult};
use crate::identity::{IdentityClaim, Role};
use crate::sessions::store::TokenStore;
use crate::sessions::token::SessionToken;
use crate::sessions::verifier::{CredentialProof, CredentialVerifier, Verification, VerifierError};
use chrono::{DateTime, Utc};
use clinic_ids::{RecordId, TokenId};
use clinic_types::EmailAddress;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const UPSTREAM_ATTEMPTS: usize = 2;

pub struct SessionBroker {
    store: Arc<dyn TokenStore>,
    verifier: Arc<dyn CredentialVerifier>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    retention: chrono::Duration,
    verifier_timeout: Duration,
    upstream_backoff: Duration,
}

impl SessionBroker {
    pub fn new(
        cfg: &CoreConfig,
        store: Arc<dyn TokenStore>,
        verifier: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            ttl: cfg.session_ttl(),
            retention: cfg.session_retention(),
            verifier_timeout: cfg.sessions().verifier_timeout,
            upstream_backoff: cfg.sessions().upstream_backoff,
        }
    }

    /// Issue a token for `role`, revoking any earlier token for the same `(user, role)`.
    ///
    /// Tokens held for other roles are untouched.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidCredential`] for an unknown email, a malformed email or a wrong
    ///   password.
    /// - [`CoreError::RoleNotPermitted`] if the account does not hold `role`.
    /// - [`CoreError::UpstreamUnavailable`] if the verifier or the store cannot answer.
    pub async fn issue(
        &self,
        email: &str,
        proof: &CredentialProof,
        role: Role,
    ) -> CoreResult<SessionToken> {
        let email = EmailAddress::parse(email).map_err(|_| CoreError::InvalidCredential)?;

        let identity = match self.verify_with_retry(&email, proof).await? {
            Verification::Verified(identity) => identity,
            Verification::Rejected => {
                tracing::warn!(role = %role, "credential rejected");
                return Err(CoreError::InvalidCredential);
            }
        };
        if !identity.permits(role) {
            tracing::warn!(user_id = %identity.user_id, role = %role, "role not permitted");
            return Err(CoreError::RoleNotPermitted { role });
        }

        let issued_at = self.clock.now();
        let token = SessionToken {
            token_id: TokenId::generate(),
            user_id: identity.user_id,
            role,
            email: identity.email,
            display_name: identity.display_name,
            issued_at,
            expires_at: issued_at
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            revoked: false,
        };

        let displaced = self.store_call("install", || self.store.install(token.clone()))?;
        tracing::info!(
            user_id = %token.user_id,
            role = %role,
            token = %token.token_id.prefix(),
            replaced = ?displaced.map(|id| id.prefix()),
            "issued session token"
        );
        Ok(token)
    }

    /// Resolve a raw token string to the claim it carries.
    ///
    /// # Errors
    ///
    /// [`CoreError::TokenInvalid`] for anything that is not a live token, including strings
    /// that do not parse as a token id.
    pub fn validate(&self, raw_token: &str) -> CoreResult<IdentityClaim> {
        let Ok(token_id) = TokenId::parse(raw_token) else {
            tracing::debug!("malformed session token");
            return Err(CoreError::TokenInvalid);
        };
        let now = self.clock.now();
        match self.store_call("get", || self.store.get(&token_id))? {
            Some(token) if token.is_live(now) => Ok(token.claim()),
            Some(_) => {
                tracing::debug!(token = %token_id.prefix(), "session token revoked or expired");
                Err(CoreError::TokenInvalid)
            }
            None => {
                tracing::debug!(token = %token_id.prefix(), "session token unknown");
                Err(CoreError::TokenInvalid)
            }
        }
    }

    /// Revoke one token. Unknown, malformed and already revoked tokens are a no-op.
    pub fn revoke(&self, raw_token: &str) -> CoreResult<()> {
        let Ok(token_id) = TokenId::parse(raw_token) else {
            return Ok(());
        };
        if self.store_call("revoke", || self.store.revoke(&token_id))? {
            tracing::info!(token = %token_id.prefix(), "revoked session token");
        }
        Ok(())
    }

    /// Revoke every token of `user_id`, expired ones included. Returns how many rows were
    /// not yet revoked.
    pub fn revoke_all(&self, user_id: &RecordId) -> CoreResult<usize> {
        let revoked = self.store_call("revoke_all", || self.store.revoke_all(user_id))?;
        tracing::info!(user_id = %user_id, revoked, "revoked all session tokens");
        Ok(revoked)
    }

    /// Roles for which `user_id` currently holds a live token.
    pub fn active_roles(&self, user_id: &RecordId) -> CoreResult<BTreeSet<Role>> {
        let now = self.clock.now();
        let active = self.store_call("list_active", || self.store.list_active(user_id, now))?;
        Ok(active.into_iter().map(|token| token.role).collect())
    }

    /// Hard-delete tokens that expired more than the retention grace ago.
    pub fn purge_expired(&self) -> CoreResult<usize> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.store_call("purge_expired", || self.store.purge_expired(cutoff))
    }

    async fn verify_with_retry(
        &self,
        email: &EmailAddress,
        proof: &CredentialProof,
    ) -> CoreResult<Verification> {
        let mut last_failure = String::new();
        for attempt in 1..=UPSTREAM_ATTEMPTS {
            let call = self.verifier.verify(email, proof);
            match tokio::time::timeout(self.verifier_timeout, call).await {
                Ok(Ok(verification)) => return Ok(verification),
                Ok(Err(VerifierError::Unavailable(reason))) => last_failure = reason,
                Err(_) => {
                    last_failure = format!(
                        "credential verifier timed out after {:?}",
                        self.verifier_timeout
                    )
                }
            }
            tracing::warn!(attempt, reason = %last_failure, "credential verifier call failed");
            if attempt < UPSTREAM_ATTEMPTS {
                tokio::time::sleep(self.upstream_backoff).await;
            }
        }
        Err(CoreError::UpstreamUnavailable(last_failure))
    }

    fn store_call<T>(&self, op: &'static str, call: impl Fn() -> StoreResult<T>) -> CoreResult<T> {
        call().or_else(|first| {
            tracing::warn!(op, error = %first, "token store call failed, retrying");
            call().map_err(|err| {
                tracing::error!(op, error = %err, "token store unavailable");
                CoreError::UpstreamUnavailable(err.to_string())
            })
        })
    }
}

/// Periodically purge expired tokens. Runs until the task is dropped.
pub async fn sweep_expired_sessions(broker: Arc<SessionBroker>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match broker.purge_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "purged expired session tokens"),
            Err(err) => tracing::error!(error = %err, "session sweep failed"),
        }
    }
}
