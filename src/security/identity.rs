//! Caller identity attached to every request by the authenticator.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::response::ApiError;

/// A user account as resolved by the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub activated: bool,
}

/// Who is making a request.
///
/// Exactly one value is inserted into the request extensions per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

/// Handlers and guards read the identity as an extractor. A missing identity
/// means the authenticator is not in front of the route, which is a server
/// error rather than an anonymous caller.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::internal("identity missing from request context"))
    }
}
