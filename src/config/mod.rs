//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ApiConfig (validated, immutable)
//!     → copied into the admission chain at build time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the chain is built; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ApiConfig;
pub use schema::CorsConfig;
pub use schema::LimiterConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
