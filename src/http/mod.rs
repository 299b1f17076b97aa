//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, access trace)
//!     → chain.rs (admission stages, in order)
//!         → recovery.rs (panic → 500, connection close)
//!         → security/* and observability/metrics.rs stages
//!     → route guards and handlers
//!     → response.rs (rejections as JSON errors)
//! ```

pub mod chain;
pub mod recovery;
pub mod request;
pub mod response;
pub mod server;

pub use chain::AdmissionChain;
pub use response::ApiError;
pub use server::{ApiServer, X_REQUEST_ID};
