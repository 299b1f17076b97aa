//! In-memory store implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::security::identity::User;
use crate::store::{PermissionStore, Permissions, StoreError, TokenScope, UserStore};

/// A thread-safe store for users, tokens and permissions.
///
/// Lookups are counted so callers can observe whether a collaborator call
/// happened. [`MemoryStore::set_unavailable`] makes every lookup fail with a
/// backend error.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    tokens: DashMap<(TokenScope, String), i64>,
    permissions: DashMap<i64, Permissions>,
    token_lookups: AtomicUsize,
    permission_lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Register a plaintext token for a user.
    pub fn insert_token(&self, scope: TokenScope, token: impl Into<String>, user_id: i64) {
        self.tokens.insert((scope, token.into()), user_id);
    }

    pub fn revoke_token(&self, scope: TokenScope, token: &str) {
        self.tokens.remove(&(scope, token.to_string()));
    }

    /// Add permission codes to a user's set.
    pub fn grant<I, S>(&self, user_id: i64, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let granted: Permissions = codes.into_iter().collect();
        let mut entry = self.permissions.entry(user_id).or_default();
        entry.0.extend(granted.0);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of token resolutions performed so far.
    pub fn token_lookups(&self) -> usize {
        self.token_lookups.load(Ordering::SeqCst)
    }

    /// Number of permission lookups performed so far.
    pub fn permission_lookups(&self) -> usize {
        self.permission_lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Backend("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn resolve_token(&self, scope: TokenScope, token: &str) -> Result<User, StoreError> {
        self.token_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let user_id = self
            .tokens
            .get(&(scope, token.to_string()))
            .map(|r| *r.value())
            .ok_or(StoreError::RecordNotFound)?;

        self.users
            .get(&user_id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::RecordNotFound)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self
            .permissions
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}
