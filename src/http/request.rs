//! Request inspection helpers.
//!
//! # Responsibilities
//! - Derive the client key used for rate limiting
//!
//! # Design Decisions
//! - Proxy-supplied address headers win over the socket peer, so the
//!   service is expected to sit behind a proxy that overwrites them

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::Request};

pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Best-effort client address for a request.
///
/// Checks `X-Real-IP`, then the first `X-Forwarded-For` hop, then the
/// connection peer. Falls back to `"unknown"` so every caller maps to a key.
pub fn client_ip<B>(request: &Request<B>) -> String {
    let headers = request.headers();

    if let Some(ip) = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ip.to_string();
    }

    if let Some(ip) = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
