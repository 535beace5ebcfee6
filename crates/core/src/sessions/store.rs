//! Token storage.
//!
//! [`TokenStore`] is the seam between the broker and whatever keeps token rows. Every method is
//! atomic with respect to concurrent callers on the same key. The in-memory implementation
//! keeps two sharded maps: token rows by id, and the current binding of each `(user, role)`
//! pair. Writers lock only the shard holding their key, so issuing for different roles or
//! users proceeds in parallel.
//!
//! Lock order is always bindings, then tokens.

use crate::error::StoreResult;
use crate::identity::Role;
use crate::sessions::token::SessionToken;
use chrono::{DateTime, Utc};
use clinic_ids::{RecordId, TokenId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub trait TokenStore: Send + Sync {
    /// Insert a token row. Binds it to its `(user, role)` pair only if that pair is unbound; a
    /// live token that should displace another must go through [`TokenStore::install`].
    fn put(&self, token: SessionToken) -> StoreResult<()>;

    fn get(&self, token_id: &TokenId) -> StoreResult<Option<SessionToken>>;

    /// Revoke the token bound to `(user_id, role)` only if it is `expected`.
    ///
    /// Returns `true` when a live row was flipped to revoked.
    fn compare_and_revoke(
        &self,
        user_id: &RecordId,
        role: Role,
        expected: &TokenId,
    ) -> StoreResult<bool>;

    /// Issuance transaction: revoke whatever is bound to the token's `(user, role)` pair,
    /// insert the token and bind it, all under the pair's lock.
    ///
    /// Returns the id of the displaced token, if there was one.
    fn install(&self, token: SessionToken) -> StoreResult<Option<TokenId>>;

    /// Set `revoked` on a token. Returns `true` when the flag changed.
    fn revoke(&self, token_id: &TokenId) -> StoreResult<bool>;

    /// Revoke every token row of `user_id`, bound or not. Returns how many flags changed.
    fn revoke_all(&self, user_id: &RecordId) -> StoreResult<usize>;

    fn list_active(
        &self,
        user_id: &RecordId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SessionToken>>;

    /// Hard-delete every token whose `expires_at` is before `cutoff`.
    fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    bindings: DashMap<(RecordId, Role), TokenId>,
    tokens: DashMap<TokenId, SessionToken>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token rows, revoked and expired ones included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn mark_revoked(&self, token_id: &TokenId) -> bool {
        match self.tokens.get_mut(token_id) {
            Some(mut row) if !row.revoked => {
                row.revoked = true;
                true
            }
            _ => false,
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn put(&self, token: SessionToken) -> StoreResult<()> {
        let key = (token.user_id, token.role);
        let token_id = token.token_id;
        let binding = self.bindings.entry(key).or_insert(token_id);
        self.tokens.insert(token_id, token);
        drop(binding);
        Ok(())
    }

    fn get(&self, token_id: &TokenId) -> StoreResult<Option<SessionToken>> {
        Ok(self.tokens.get(token_id).map(|row| row.value().clone()))
    }

    fn compare_and_revoke(
        &self,
        user_id: &RecordId,
        role: Role,
        expected: &TokenId,
    ) -> StoreResult<bool> {
        let Some(binding) = self.bindings.get(&(*user_id, role)) else {
            return Ok(false);
        };
        if binding.value() != expected {
            return Ok(false);
        }
        Ok(self.mark_revoked(expected))
    }

    fn install(&self, token: SessionToken) -> StoreResult<Option<TokenId>> {
        let key = (token.user_id, token.role);
        let token_id = token.token_id;

        let displaced = match self.bindings.entry(key) {
            Entry::Occupied(mut binding) => {
                let previous = *binding.get();
                self.mark_revoked(&previous);
                self.tokens.insert(token_id, token);
                binding.insert(token_id);
                Some(previous)
            }
            Entry::Vacant(binding) => {
                self.tokens.insert(token_id, token);
                binding.insert(token_id);
                None
            }
        };
        Ok(displaced)
    }

    fn revoke(&self, token_id: &TokenId) -> StoreResult<bool> {
        Ok(self.mark_revoked(token_id))
    }

    fn revoke_all(&self, user_id: &RecordId) -> StoreResult<usize> {
        let mut revoked = 0;
        for mut row in self.tokens.iter_mut() {
            if row.user_id == *user_id && !row.revoked {
                row.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    fn list_active(
        &self,
        user_id: &RecordId,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<SessionToken>> {
        let mut active = Vec::new();
        for role in Role::ALL {
            let Some(binding) = self.bindings.get(&(*user_id, role)) else {
                continue;
            };
            if let Some(row) = self.tokens.get(binding.value()) {
                if row.is_live(now) {
                    active.push(row.value().clone());
                }
            }
        }
        Ok(active)
    }

    fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let before = self.tokens.len();
        self.tokens.retain(|_, row| row.expires_at >= cutoff);
        let removed = before.saturating_sub(self.tokens.len());

        self.bindings.retain(|_, token_id| self.tokens.contains_key(token_id));
        Ok(removed)
    }
}
