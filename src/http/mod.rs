//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, server span, key/value envelope)
//!     → ui.rs (HTML form)      → client.rs → next hop
//!       relay.rs (controller)  → store delegate (memory, or client.rs → next hop)
//!     → response.rs (errors to status + plain text)
//!     → Send to client
//! ```

pub mod client;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod ui;

pub use client::{UpstreamClient, UpstreamResponse};
pub use request::{KeyParams, MakeRequestUuid, X_REQUEST_ID};
pub use response::RelayError;
pub use server::{HttpServer, ServerError};
