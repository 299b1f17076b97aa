//! Cross-origin negotiation against an exact-match origin allow-list.
//!
//! # Design Decisions
//! - `Vary` is added to every response so shared caches never mix
//!   per-origin answers
//! - Preflights from trusted origins are answered here and never reach
//!   the downstream stages
//! - Untrusted or absent origins get no CORS headers; the browser then
//!   applies its same-origin policy

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

/// Methods advertised to trusted preflights.
pub const ALLOWED_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";

/// Request headers advertised to trusted preflights.
pub const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

/// Origin allow-list.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    trusted_origins: BTreeSet<String>,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            trusted_origins: config.trusted_origins.clone(),
        }
    }

    pub fn is_trusted(&self, origin: &str) -> bool {
        self.trusted_origins.contains(origin)
    }
}

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

fn add_vary(headers: &mut HeaderMap) {
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    headers.append(
        header::VARY,
        HeaderValue::from_static("Access-Control-Request-Method"),
    );
}

/// Middleware applying the CORS policy.
pub async fn negotiate_cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let trusted_origin = request
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| {
            origin
                .to_str()
                .map(|origin| policy.is_trusted(origin))
                .unwrap_or(false)
        })
        .cloned();

    let Some(origin) = trusted_origin else {
        let mut response = next.run(request).await;
        add_vary(response.headers_mut());
        return response;
    };

    if is_preflight(&request) {
        tracing::debug!(origin = ?origin, "Answering CORS preflight");
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        add_vary(headers);
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    add_vary(headers);
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(origin);
    response
}
