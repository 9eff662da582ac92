//! Relay controller.
//!
//! Serves `GET /?key=` and `POST /?key=&value=` on every path and hands the
//! work to a [`KvStore`] delegate: the in-memory map on the backend, the next
//! hop on the frontend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use tracing::instrument;

use crate::config::Role;
use crate::http::request::KeyParams;
use crate::http::response::RelayError;
use crate::observability::metrics;
use crate::store::{Entry, KvStore};

/// How a relay renders successful results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Raw value as `text/plain`; writes acknowledged with 204.
    Plain,
    /// `{"key", "value"}` JSON; writes acknowledged with 200.
    Json,
}

impl ResponseFormat {
    fn found(self, key: &str, value: String) -> Response {
        match self {
            ResponseFormat::Plain => (StatusCode::OK, value).into_response(),
            ResponseFormat::Json => Json(Entry {
                key: key.to_string(),
                value,
            })
            .into_response(),
        }
    }

    fn stored(self) -> StatusCode {
        match self {
            ResponseFormat::Plain => StatusCode::NO_CONTENT,
            ResponseFormat::Json => StatusCode::OK,
        }
    }
}

/// Shared state of a relay service.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    role: Role,
    store: Arc<dyn KvStore>,
    format: ResponseFormat,
    simulated_latency: Duration,
}

impl RelayState {
    pub fn new(
        role: Role,
        store: Arc<dyn KvStore>,
        format: ResponseFormat,
        simulated_latency: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                role,
                store,
                format,
                simulated_latency,
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }
}

/// Router mounting the controller on `/` and every path below it.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", any(relay_handler))
        .route("/{*path}", any(relay_handler))
        .with_state(state)
}

#[instrument(name = "relay.request", skip_all, fields(component = %state.role(), method = %method))]
async fn relay_handler(
    State(state): State<RelayState>,
    method: Method,
    params: KeyParams,
) -> Result<Response, RelayError> {
    if method != Method::GET && method != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }

    if !state.inner.simulated_latency.is_zero() {
        tokio::time::sleep(state.inner.simulated_latency).await;
    }

    if method == Method::GET {
        handle_get(&state, &params).await
    } else {
        handle_post(&state, &params).await
    }
}

#[instrument(name = "relay.get", skip_all, fields(key = params.key()))]
async fn handle_get(state: &RelayState, params: &KeyParams) -> Result<Response, RelayError> {
    let key = params.key().ok_or(RelayError::MissingKey)?;
    let role = state.role();

    let found = match state.inner.store.get(key).await {
        Ok(found) => found,
        Err(e) => {
            metrics::record_store_op(role, "get", "error");
            return Err(RelayError::Get(e));
        }
    };

    match found {
        Some(value) => {
            metrics::record_store_op(role, "get", "hit");
            Ok(state.inner.format.found(key, value))
        }
        None => {
            metrics::record_store_op(role, "get", "miss");
            Err(RelayError::NotFound)
        }
    }
}

#[instrument(name = "relay.set", skip_all, fields(key = params.key()))]
async fn handle_post(state: &RelayState, params: &KeyParams) -> Result<Response, RelayError> {
    let key = params.key().ok_or(RelayError::MissingKey)?;
    let value = params.value().ok_or(RelayError::MissingValue)?;
    let role = state.role();

    if let Err(e) = state.inner.store.set(key, value).await {
        metrics::record_store_op(role, "set", "error");
        return Err(RelayError::Set(e));
    }

    metrics::record_store_op(role, "set", "ok");
    Ok(state.inner.format.stored().into_response())
}
