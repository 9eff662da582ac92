//! Distributed tracing support.
//!
//! # Responsibilities
//! - Build the OpenTelemetry tracer provider for a service role
//! - Extract trace context from incoming requests
//! - Propagate trace context to upstream requests
//!
//! # Design Decisions
//! - W3C Trace Context + Baggage, composed into one propagator
//! - The propagator is a value owned by the server and the upstream client,
//!   not a process global
//! - With the `none` exporter spans are still created and sampled so the
//!   context keeps flowing between hops

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{
    Extractor, Injector, TextMapCompositePropagator, TextMapPropagator,
};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::{Role, TraceExporter, TracingConfig};
use crate::observability::TelemetryError;

/// Handle on the tracer provider for one service process.
pub struct Telemetry {
    provider: SdkTracerProvider,
    role: Role,
}

impl Telemetry {
    /// Tracer that the `tracing` bridge layer records spans into.
    pub fn tracer(&self) -> SdkTracer {
        self.provider.tracer(format!("kv-relay-{}", self.role))
    }

    /// Flush pending spans and stop the exporter.
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        self.provider.shutdown()?;
        Ok(())
    }
}

/// Build the tracer provider for `role` according to `config`.
pub fn init_telemetry(role: Role, config: &TracingConfig) -> Result<Telemetry, TelemetryError> {
    let resource = Resource::builder()
        .with_service_name(format!("kv-relay-{}", role))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let builder = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sample_ratio,
        ))));

    let provider = match config.exporter {
        TraceExporter::Otlp => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(config.endpoint.clone())
                .build()?;
            builder.with_batch_exporter(exporter).build()
        }
        TraceExporter::Stdout => builder
            .with_batch_exporter(opentelemetry_stdout::SpanExporter::default())
            .build(),
        TraceExporter::None => builder.build(),
    };

    Ok(Telemetry { provider, role })
}

/// Injects and extracts W3C trace context on HTTP headers.
#[derive(Clone)]
pub struct TracePropagator {
    inner: Arc<TextMapCompositePropagator>,
}

impl TracePropagator {
    pub fn new() -> Self {
        let inner = TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Write the context of the current `tracing` span into `headers`.
    pub fn inject_current(&self, headers: &mut HeaderMap) {
        let cx = ::tracing::Span::current().context();
        self.inject(&cx, headers);
    }

    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.inner.inject_context(cx, &mut HeaderInjector(headers));
    }

    /// Read a remote parent context from incoming `headers`.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.inner.extract(&HeaderExtractor(headers))
    }
}

impl Default for TracePropagator {
    fn default() -> Self {
        Self::new()
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let name = HeaderName::from_bytes(key.as_bytes());
        let value = HeaderValue::from_str(&value);
        if let (Ok(name), Ok(value)) = (name, value) {
            self.0.insert(name, value);
        }
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };

    const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
    const SPAN_ID: &str = "00f067aa0ba902b7";

    fn remote_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_hex(TRACE_ID).unwrap(),
            SpanId::from_hex(SPAN_ID).unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_inject_writes_traceparent() {
        let propagator = TracePropagator::new();
        let mut headers = HeaderMap::new();
        propagator.inject(&remote_context(), &mut headers);

        assert_eq!(
            headers.get("traceparent").unwrap(),
            &format!("00-{}-{}-01", TRACE_ID, SPAN_ID)
        );
    }

    #[test]
    fn test_extract_reads_parent() {
        let propagator = TracePropagator::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_str(&format!("00-{}-{}-01", TRACE_ID, SPAN_ID)).unwrap(),
        );

        let cx = propagator.extract(&headers);
        let span = cx.span();
        let span_context = span.span_context();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(span_context.trace_id().to_string(), TRACE_ID);
        assert_eq!(span_context.span_id().to_string(), SPAN_ID);
    }

    #[test]
    fn test_extract_without_headers_is_empty() {
        let propagator = TracePropagator::new();
        let cx = propagator.extract(&HeaderMap::new());
        assert!(!cx.span().span_context().is_valid());
    }

    #[test]
    fn test_inject_without_span_writes_nothing() {
        let propagator = TracePropagator::new();
        let mut headers = HeaderMap::new();
        propagator.inject(&Context::new(), &mut headers);
        assert!(headers.get("traceparent").is_none());
    }
}
