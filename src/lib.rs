//! Key/value relay chain with structured logging and distributed tracing.
//!
//! Three roles of one binary form a chain:
//!
//! ```text
//!  browser ──▶ ui (8080) ──▶ frontend (4040) ──▶ backend (4041)
//!              HTML form     relay, plain text   relay, JSON + in-memory store
//! ```
//!
//! Every hop logs JSON with its component name, answers with an
//! `x-request-id`, and forwards W3C trace context to the next one.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::{RelayConfig, Role};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
