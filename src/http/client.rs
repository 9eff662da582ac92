//! Outbound HTTP client for the next hop.
//!
//! # Responsibilities
//! - Build `?key=` / `?key=&value=` requests against the upstream base URL
//! - Inject the current trace context into request headers
//! - Hand back status, content type and body; interpretation is left to
//!   the caller
//!
//! No retries and no timeout beyond the inbound request's own.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tracing::instrument;
use url::Url;

use crate::observability::TracePropagator;
use crate::store::StoreError;

/// Upper bound on an upstream response body.
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// What the upstream answered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// HTTP/1 client bound to one upstream base URL.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    base_url: Url,
    propagator: TracePropagator,
}

impl UpstreamClient {
    pub fn new(base_url: Url, propagator: TracePropagator) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            base_url,
            propagator,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET <base>?key=<key>`
    #[instrument(name = "client.get", skip(self), fields(service = "client", otel.kind = "client"))]
    pub async fn get(&self, key: &str) -> Result<UpstreamResponse, StoreError> {
        let url = self.url_for(&[("key", key)]);
        self.send(Method::GET, url).await
    }

    /// `POST <base>?key=<key>&value=<value>`
    #[instrument(name = "client.set", skip(self), fields(service = "client", otel.kind = "client"))]
    pub async fn post(&self, key: &str, value: &str) -> Result<UpstreamResponse, StoreError> {
        let url = self.url_for(&[("key", key), ("value", value)]);
        self.send(Method::POST, url).await
    }

    fn url_for(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().extend_pairs(params);
        url
    }

    async fn send(&self, method: Method, url: Url) -> Result<UpstreamResponse, StoreError> {
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| StoreError::InvalidRequest(e.to_string()))?;

        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        self.propagator.inject_current(request.headers_mut());

        let response = self.client.request(request).await.map_err(|e| {
            tracing::error!(method = %method, url = %url, error = %e, "Upstream request failed");
            StoreError::Transport(e.to_string())
        })?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        tracing::debug!(method = %method, url = %url, status = %parts.status, "Upstream responded");

        Ok(UpstreamResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body,
        })
    }
}
