//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or role defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc with the HTTP server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; bind address and upstream default per role
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    LimitsConfig, LogFormat, ObservabilityConfig, RelayConfig, Role, ServiceConfig,
    TimeoutConfig, TraceExporter, TracingConfig,
};
pub use validation::{validate_config, ValidationError};
