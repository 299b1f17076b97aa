//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket)
//!     → cors.rs (origin allow-list, preflight)
//!     → authentication.rs (bearer token → Identity)
//!     → authorization.rs (route guards)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Collaborator errors are server errors, never treated as "denied"

pub mod authentication;
pub mod authorization;
pub mod cors;
pub mod identity;
pub mod rate_limit;

pub use authorization::{require_activated, require_authenticated, require_permission};
pub use identity::{Identity, User};
