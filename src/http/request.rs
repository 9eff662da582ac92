//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the caller sent one
//! - Open the per-request span, parented on the caller's trace context
//! - Extract the key/value request envelope
//!
//! # Design Decisions
//! - Request ID added as early as possible so the span can carry it
//! - Parameters never reject a request: the first occurrence of a repeated
//!   name wins and unknown names are ignored
//! - Empty parameters count as missing

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::MakeSpan;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::Role;
use crate::observability::TracePropagator;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Builds the server span for each inbound request.
#[derive(Clone)]
pub struct RelayMakeSpan {
    role: Role,
    propagator: TracePropagator,
}

impl RelayMakeSpan {
    pub fn new(role: Role, propagator: TracePropagator) -> Self {
        Self { role, propagator }
    }
}

impl<B> MakeSpan<B> for RelayMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");

        let span = tracing::info_span!(
            "http.request",
            component = %self.role,
            http.method = %request.method(),
            http.target = %request.uri(),
            request_id = %request_id,
            otel.kind = "server",
        );
        span.set_parent(self.propagator.extract(request.headers()));
        span
    }
}

/// Key/value envelope carried in the query string or a form body.
///
/// As an extractor it reads the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyParams {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl KeyParams {
    /// Parse `application/x-www-form-urlencoded` input.
    pub fn parse(input: &[u8]) -> Self {
        let mut params = KeyParams::default();
        for (name, value) in form_urlencoded::parse(input) {
            match name.as_ref() {
                "key" if params.key.is_none() => params.key = Some(value.into_owned()),
                "value" if params.value.is_none() => params.value = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    pub fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    pub fn value(&self) -> Option<&str> {
        non_empty(&self.value)
    }

    /// Fill missing fields from `other`.
    pub fn or(self, other: KeyParams) -> KeyParams {
        KeyParams {
            key: self.key.filter(|k| !k.is_empty()).or(other.key),
            value: self.value.filter(|v| !v.is_empty()).or(other.value),
        }
    }
}

impl<S> FromRequestParts<S> for KeyParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query().unwrap_or_default().as_bytes()))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
