//! Route-level authorization guards.
//!
//! Guards nest from broad to narrow:
//!
//! ```text
//! require_permission(code)
//!     → require_activated
//!         → require_authenticated
//! ```
//!
//! Each wrapper adds its own check innermost and then applies the broader
//! guard around it, so a narrower check only runs once every broader
//! precondition has passed. An anonymous caller on a permission-gated route
//! therefore always gets `authentication_required`.
//!
//! All guards rely on the authenticator having attached an [`Identity`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::http::response::ApiError;
use crate::security::identity::{Identity, User};
use crate::store::PermissionStore;

/// Reject anonymous callers.
pub fn require_authenticated<S>(route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn(authenticated_guard))
}

/// Reject anonymous callers, then callers whose account is not activated.
pub fn require_activated<S>(route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    require_authenticated(route.route_layer(middleware::from_fn(activated_guard)))
}

/// Reject callers failing [`require_activated`], then callers lacking `code`.
pub fn require_permission<S>(
    code: impl Into<String>,
    permissions: Arc<dyn PermissionStore>,
    route: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let code: String = code.into();
    let gate = PermissionGate {
        code: Arc::from(code),
        permissions,
    };
    require_activated(route.route_layer(middleware::from_fn_with_state(gate, permission_guard)))
}

/// State for a single permission check.
#[derive(Clone)]
struct PermissionGate {
    code: Arc<str>,
    permissions: Arc<dyn PermissionStore>,
}

fn authenticated_user(identity: &Identity) -> Result<&User, ApiError> {
    identity.user().ok_or(ApiError::AuthenticationRequired)
}

fn activated_user(identity: &Identity) -> Result<&User, ApiError> {
    let user = authenticated_user(identity)?;
    if user.activated {
        Ok(user)
    } else {
        Err(ApiError::InactiveAccount)
    }
}

async fn authenticated_guard(
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticated_user(&identity)?;
    Ok(next.run(request).await)
}

async fn activated_guard(
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    activated_user(&identity)?;
    Ok(next.run(request).await)
}

async fn permission_guard(
    State(gate): State<PermissionGate>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = activated_user(&identity)?;

    let permissions = gate
        .permissions
        .permissions_for_user(user.id)
        .await
        .map_err(|e| ApiError::internal(format!("loading permissions for user {}: {e}", user.id)))?;

    if !permissions.includes(&gate.code) {
        tracing::debug!(user_id = user.id, code = %gate.code, "Permission denied");
        return Err(ApiError::NotPermitted);
    }

    Ok(next.run(request).await)
}
