//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, JSON on stderr)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (OpenTelemetry spans, W3C context propagation)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → OTLP collector or stdout
//! ```
//!
//! # Design Decisions
//! - Tracer provider and propagator are built once in `main` and handed to
//!   the components that need them
//! - `tracing` spans are bridged to OpenTelemetry, so one `#[instrument]`
//!   produces both a log context and an exported span

use thiserror::Error;

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::tracing::{init_telemetry, Telemetry, TracePropagator};

/// Errors raised while setting up or tearing down telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("failed to shut down tracer provider: {0}")]
    Shutdown(#[from] opentelemetry_sdk::error::OTelSdkError),

    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
