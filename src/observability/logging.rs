//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for a service process
//! - Bridge spans into OpenTelemetry when a tracer is supplied
//!
//! # Design Decisions
//! - JSON lines on stderr for production, pretty format for development
//! - Each JSON line lists every enclosing span, so the request span's
//!   `component` (the service role) is on every line
//! - `RUST_LOG` overrides the configured level
//! - The level filter gates log output only; the OpenTelemetry layer has its
//!   own filter, so request spans exist at any log level
//! - HTTP client and exporter internals are kept out of both, so the span
//!   exporter does not trace its own requests

use opentelemetry_sdk::trace::SdkTracer;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{
        self,
        format::{Format, Json, JsonFields},
        MakeWriter,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::TelemetryError;

const NOISY_TARGETS: &[&str] = &[
    "hyper",
    "hyper_util",
    "h2",
    "reqwest",
    "opentelemetry",
    "opentelemetry_sdk",
    "opentelemetry_otlp",
];

/// Default filter directives for a configured level.
pub fn default_directives(level: &str) -> String {
    let mut directives = level.to_ascii_lowercase();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}

/// Spans handed to OpenTelemetry, whatever the log level.
pub fn trace_filter() -> Targets {
    NOISY_TARGETS.iter().fold(
        Targets::new().with_default(Level::INFO),
        |targets, target| targets.with_target(*target, LevelFilter::OFF),
    )
}

/// JSON formatter used for production output.
pub fn json_layer<S, W>(writer: W) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(writer)
}

/// Build the subscriber for a service process without installing it.
pub fn subscriber(
    config: &ObservabilityConfig,
    tracer: Option<SdkTracer>,
) -> impl Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => json_layer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
    };

    let otel = tracer.map(|tracer| {
        tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(trace_filter())
    });

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .with(otel)
}

/// Install the global subscriber.
pub fn init_logging(
    config: &ObservabilityConfig,
    tracer: Option<SdkTracer>,
) -> Result<(), TelemetryError> {
    subscriber(config, tracer).try_init()?;
    Ok(())
}
