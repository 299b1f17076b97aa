//! Request admission layer for an HTTP API server.
//!
//! Decides, before a request reaches business logic, whether it may proceed
//! and who is making it, and records what happened afterwards.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::ApiConfig;
pub use http::{AdmissionChain, ApiServer};
pub use lifecycle::Shutdown;
