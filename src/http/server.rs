//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the role's router (UI pages or relay controller)
//! - Wire up the store delegate or upstream client the role needs
//! - Apply middleware (request ID, tracing, metrics, body limit, timeout)
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use url::Url;

use crate::config::{RelayConfig, Role};
use crate::http::client::UpstreamClient;
use crate::http::relay::{self, RelayState, ResponseFormat};
use crate::http::request::{MakeRequestUuid, RelayMakeSpan};
use crate::http::ui::{self, UiState};
use crate::observability::{metrics, TracePropagator};
use crate::store::{KvStore, MemoryStore, RemoteStore};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream URL: {0}")]
    InvalidUpstream(#[from] url::ParseError),

    #[error("{0} role requires an upstream URL")]
    MissingUpstream(Role),

    #[error("failed to load UI template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One service of the chain, ready to serve.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Build the server for the role named in `config`.
    pub fn new(config: RelayConfig, propagator: TracePropagator) -> Result<Self, ServerError> {
        let role = config.service.role;

        let app = match role {
            Role::Backend => {
                tracing::info!(component = %role, "Using in-memory store");
                Self::relay_app(&config, Arc::new(MemoryStore::new()), ResponseFormat::Json)
            }
            Role::Frontend => {
                let client = Self::upstream_client(&config, &propagator)?;
                tracing::info!(component = %role, upstream = %client.base_url(), "Relaying to upstream");
                Self::relay_app(
                    &config,
                    Arc::new(RemoteStore::new(client)),
                    ResponseFormat::Plain,
                )
            }
            Role::Ui => {
                let client = Self::upstream_client(&config, &propagator)?;
                tracing::info!(component = %role, upstream = %client.base_url(), "Serving UI");
                ui::router(UiState::new(client)?)
            }
        };

        let router = Self::build_router(&config, app, propagator);
        Ok(Self { router, config })
    }

    /// Build a relay server around an explicit store delegate.
    pub fn with_store(
        config: RelayConfig,
        store: Arc<dyn KvStore>,
        format: ResponseFormat,
        propagator: TracePropagator,
    ) -> Self {
        let app = Self::relay_app(&config, store, format);
        let router = Self::build_router(&config, app, propagator);
        Self { router, config }
    }

    fn relay_app(config: &RelayConfig, store: Arc<dyn KvStore>, format: ResponseFormat) -> Router {
        relay::router(RelayState::new(
            config.service.role,
            store,
            format,
            Duration::from_millis(config.service.simulated_latency_ms),
        ))
    }

    fn upstream_client(
        config: &RelayConfig,
        propagator: &TracePropagator,
    ) -> Result<UpstreamClient, ServerError> {
        let role = config.service.role;
        let upstream = config
            .service
            .upstream_url()
            .ok_or(ServerError::MissingUpstream(role))?;
        Ok(UpstreamClient::new(Url::parse(upstream)?, propagator.clone()))
    }

    /// Wrap the role's routes in the shared middleware stack.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, app: Router, propagator: TracePropagator) -> Router {
        let role = config.service.role;

        app.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(RelayMakeSpan::new(role, propagator))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.timeouts.request_secs,
                ))),
        )
        .layer(middleware::from_fn_with_state(role, metrics::track_metrics))
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let role = self.config.service.role;
        tracing::info!(component = %role, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(component = %role, "Shutdown signal received, draining");
            })
            .await?;

        tracing::info!(component = %role, "HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Store whose every call fails as if the upstream were unreachable.
    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Transport("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Transport("connection refused".into()))
        }
    }

    fn backend() -> Router {
        HttpServer::new(RelayConfig::for_role(Role::Backend), TracePropagator::new())
            .unwrap()
            .router()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_response_carries_generated_request_id() {
        let response = backend()
            .oneshot(request(Method::GET, "/?key=a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let id = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_backend_answers_json() {
        let app = backend();
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/?key=a&value=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request(Method::GET, "/?key=a")).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"key":"a","value":"1"}"#);
    }

    #[tokio::test]
    async fn test_caller_request_id_is_kept() {
        let request = Request::builder()
            .uri("/?key=a")
            .header(X_REQUEST_ID, "caller-id-1")
            .body(Body::empty())
            .unwrap();
        let response = backend().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "caller-id-1");
    }

    #[tokio::test]
    async fn test_error_responses_carry_request_id() {
        let response = backend()
            .oneshot(request(Method::DELETE, "/?key=a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = RelayConfig::for_role(Role::Backend);
        config.limits.max_body_bytes = 16;
        let app = HttpServer::new(config, TracePropagator::new())
            .unwrap()
            .router();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/?key=a&value=1")
            .header(header::CONTENT_LENGTH, "64")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let app = HttpServer::with_store(
            RelayConfig::for_role(Role::Frontend),
            Arc::new(BrokenStore),
            ResponseFormat::Plain,
            TracePropagator::new(),
        )
        .router();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/?key=a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"failed to get value");

        let response = app
            .oneshot(request(Method::POST, "/?key=a&value=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_upstream_url() {
        let mut config = RelayConfig::for_role(Role::Frontend);
        config.service.upstream_url = Some("not a url".into());
        let result = HttpServer::new(config, TracePropagator::new());
        assert!(matches!(result, Err(ServerError::InvalidUpstream(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server =
            HttpServer::new(RelayConfig::for_role(Role::Backend), TracePropagator::new()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(server.run(listener, rx));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
