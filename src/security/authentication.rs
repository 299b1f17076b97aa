//! Bearer-token authentication.
//!
//! Every request leaves this stage with exactly one [`Identity`] in its
//! extensions, or with an error response.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;
use crate::security::identity::Identity;
use crate::store::{StoreError, TokenScope, UserStore};

/// State for the authentication middleware.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Resolve an `Authorization` header value to an identity.
    pub async fn identify(&self, authorization: Option<&HeaderValue>) -> Result<Identity, ApiError> {
        // An empty header counts as no header.
        let Some(value) = authorization.filter(|v| !v.is_empty()) else {
            return Ok(Identity::Anonymous);
        };

        let token = bearer_token(value).ok_or(ApiError::InvalidAuthenticationToken)?;

        if !self.users.validate_token_shape(token) {
            tracing::debug!("Rejected malformed bearer token");
            return Err(ApiError::InvalidAuthenticationToken);
        }

        match self.users.resolve_token(TokenScope::Authentication, token).await {
            Ok(user) => Ok(Identity::Authenticated(user)),
            Err(StoreError::RecordNotFound) => {
                tracing::debug!(
                    scope = TokenScope::Authentication.as_str(),
                    "Bearer token did not match an active token"
                );
                Err(ApiError::InvalidAuthenticationToken)
            }
            Err(e) => Err(ApiError::internal(format!("resolving authentication token: {e}"))),
        }
    }
}

/// Split `Bearer <token>` on single spaces; anything but exactly two parts
/// with the `Bearer` scheme is malformed.
fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Middleware attaching the caller's identity to the request.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request.headers().get(header::AUTHORIZATION).cloned();
    let identity = authenticator.identify(authorization.as_ref()).await;

    let mut response = match identity {
        Ok(identity) => {
            if let Some(user) = identity.user() {
                tracing::debug!(user_id = user.id, "Request authenticated");
            }
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::identity::User;
    use crate::store::MemoryStore;

    const TOKEN: &str = "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU";

    fn setup() -> (Arc<MemoryStore>, Authenticator) {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(User {
            id: 3,
            name: "Carol".into(),
            email: "carol@example.com".into(),
            activated: true,
        });
        store.insert_token(TokenScope::Authentication, TOKEN, 3);
        (store.clone(), Authenticator::new(store))
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let (store, auth) = setup();

        assert_eq!(auth.identify(None).await.unwrap(), Identity::Anonymous);
        assert_eq!(store.token_lookups(), 0);
    }

    #[tokio::test]
    async fn test_empty_header_is_anonymous() {
        let (store, auth) = setup();

        let identity = auth.identify(Some(&header(""))).await.unwrap();
        assert_eq!(identity, Identity::Anonymous);
        assert_eq!(store.token_lookups(), 0);
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (_, auth) = setup();

        let identity = auth.identify(Some(&header(&format!("Bearer {TOKEN}")))).await.unwrap();
        assert_eq!(identity.user().map(|u| u.id), Some(3));
    }

    #[tokio::test]
    async fn test_malformed_headers_skip_lookup() {
        let (store, auth) = setup();

        for value in [
            format!("Basic {TOKEN}"),
            format!("bearer {TOKEN}"),
            format!("Bearer {TOKEN} extra"),
            format!("Bearer  {TOKEN}"),
            "Bearer".to_string(),
            TOKEN.to_string(),
            "Bearer short".to_string(),
        ] {
            let err = auth.identify(Some(&header(&value))).await.unwrap_err();
            assert!(
                matches!(err, ApiError::InvalidAuthenticationToken),
                "{value:?} should be rejected"
            );
        }
        assert_eq!(store.token_lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let (store, auth) = setup();

        let err = auth
            .identify(Some(&header("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidAuthenticationToken));
        assert_eq!(store.token_lookups(), 1);
    }

    #[tokio::test]
    async fn test_activation_token_does_not_authenticate() {
        let (store, auth) = setup();
        store.insert_token(TokenScope::Activation, "ABCDEFGHIJKLMNOPQRSTUVWXYZ", 3);

        let err = auth
            .identify(Some(&header("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidAuthenticationToken));
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let (store, auth) = setup();
        store.set_unavailable(true);

        let err = auth
            .identify(Some(&header(&format!("Bearer {TOKEN}"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
