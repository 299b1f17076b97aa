//! Panic containment for the admission chain.
//!
//! The outermost stage. A panic anywhere below it becomes a generic 500
//! and the connection is marked for closing, since per-connection state may
//! be inconsistent after unwinding.

use std::any::Any;
use std::backtrace::Backtrace;

use axum::{
    http::{header, HeaderValue},
    response::Response,
};

use crate::http::response::ApiError;
use crate::observability::metrics;

/// Panic handler for `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    let backtrace = Backtrace::force_capture();

    tracing::error!(panic = %message, backtrace = %backtrace, "Request handler panicked");
    metrics::record_panic();

    let mut response = ApiError::internal(message).to_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
