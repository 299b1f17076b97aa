//! Collaborator contracts for identity and authorization data.
//!
//! # Data Flow
//! ```text
//! security::authentication
//!     → UserStore::validate_token_shape (no I/O)
//!     → UserStore::resolve_token(scope, token)
//! security::authorization
//!     → PermissionStore::permissions_for_user(user_id)
//! ```
//!
//! # Design Decisions
//! - Persistence lives outside this crate; only these traits are consumed
//! - Permissions are queried on demand, never cached here
//! - `memory.rs` provides a thread-safe in-process implementation

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::security::identity::User;

pub use memory::MemoryStore;

/// Length of a plaintext token: 16 random bytes, base32 encoded without padding.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Authentication,
    Activation,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::Activation => "activation",
        }
    }
}

/// Errors returned by store collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No matching, unexpired record exists.
    #[error("record not found")]
    RecordNotFound,

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Set of permission codes granted to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Cheap format check run before any lookup.
    fn validate_token_shape(&self, token: &str) -> bool {
        validate_token_plaintext(token)
    }

    /// Find the user owning an unexpired token of the given scope.
    ///
    /// Returns [`StoreError::RecordNotFound`] when no such token exists.
    async fn resolve_token(&self, scope: TokenScope, token: &str) -> Result<User, StoreError>;
}

/// Looks up the permission codes granted to a user.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;
}

/// Default token shape check: exactly [`TOKEN_PLAINTEXT_LEN`] characters of
/// the RFC 4648 base32 alphabet.
pub fn validate_token_plaintext(token: &str) -> bool {
    token.len() == TOKEN_PLAINTEXT_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
}
