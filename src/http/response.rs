//! Error responses produced by the admission chain.
//!
//! # Responsibilities
//! - Map each rejection to a status code and a stable machine-readable code
//! - Log server errors with their detail; never send the detail to clients
//!
//! # Design Decisions
//! - JSON envelope: `{"error": {"code": "...", "message": "..."}}`
//! - Client errors are not logged beyond access logging

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A terminal response for a request that may not proceed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Detail is logged, the client sees a generic message.
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl ApiError {
    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidAuthenticationToken | ApiError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable reason code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidAuthenticationToken => "invalid_authentication_token",
            ApiError::AuthenticationRequired => "authentication_required",
            ApiError::InactiveAccount => "inactive_account",
            ApiError::NotPermitted => "not_permitted",
            ApiError::RateLimitExceeded => "rate_limit_exceeded",
            ApiError::Internal(_) => "internal",
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Internal(_) => {
                "the server encountered a problem and could not process your request".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Build the response without logging. For callers that already logged
    /// the failure in more detail.
    pub(crate) fn to_response(&self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.client_message(),
            },
        };
        let mut response = (self.status(), Json(body)).into_response();

        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal server error");
        }
        self.to_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_token_sets_challenge() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_authentication_token");
    }

    #[tokio::test]
    async fn test_internal_hides_detail() {
        let response = ApiError::internal("db pool exhausted").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "internal");
        assert!(!body.to_string().contains("db pool"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::AuthenticationRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InactiveAccount.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotPermitted.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RateLimitExceeded.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
