//! Browser-facing UI.
//!
//! Renders the key/value form and forwards submissions to the frontend
//! relay. The upstream status is preserved; the upstream body is echoed
//! into the page for browsers and passed through unchanged for everyone else.
//!
//! `/set` reads a urlencoded form body first and falls back to the query
//! string per parameter.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use minijinja::{context, Environment};
use tracing::instrument;

use crate::http::client::{UpstreamClient, UpstreamResponse};
use crate::http::request::KeyParams;
use crate::http::response::RelayError;

const INDEX: &str = "index.html";

#[derive(Clone)]
pub struct UiState {
    inner: Arc<UiInner>,
}

struct UiInner {
    templates: Environment<'static>,
    upstream: UpstreamClient,
}

impl UiState {
    pub fn new(upstream: UpstreamClient) -> Result<Self, minijinja::Error> {
        let mut templates = Environment::new();
        templates.add_template(INDEX, include_str!("../../templates/index.html"))?;

        Ok(Self {
            inner: Arc::new(UiInner {
                templates,
                upstream,
            }),
        })
    }

    fn render(&self, result: Option<(StatusCode, &str)>) -> Result<String, minijinja::Error> {
        let template = self.inner.templates.get_template(INDEX)?;
        match result {
            Some((status, body)) => template.render(context! {
                status => status.to_string(),
                response => body,
            }),
            None => template.render(context! {}),
        }
    }

    fn respond(&self, headers: &HeaderMap, upstream: UpstreamResponse) -> Result<Response, RelayError> {
        if wants_html(headers) {
            let body = String::from_utf8_lossy(&upstream.body);
            let page = self.render(Some((upstream.status, &body)))?;
            // A 204 would drop the rendered page.
            let status = if upstream.status == StatusCode::NO_CONTENT {
                StatusCode::OK
            } else {
                upstream.status
            };
            return Ok((status, Html(page)).into_response());
        }

        let mut response = (upstream.status, upstream.body).into_response();
        match upstream.content_type {
            Some(content_type) => {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        Ok(response)
    }
}

pub fn router(state: UiState) -> Router {
    Router::new()
        .route("/", get(home).fallback(method_not_allowed))
        .route("/get", get(get_value).fallback(method_not_allowed))
        .route("/set", post(set_value).fallback(method_not_allowed))
        .with_state(state)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

async fn home(State(state): State<UiState>) -> Result<Html<String>, RelayError> {
    Ok(Html(state.render(None)?))
}

#[instrument(name = "ui.get", skip_all, fields(component = "ui", key = params.key()))]
async fn get_value(
    State(state): State<UiState>,
    headers: HeaderMap,
    params: KeyParams,
) -> Result<Response, RelayError> {
    let upstream = state
        .inner
        .upstream
        .get(params.key().unwrap_or_default())
        .await
        .map_err(RelayError::Upstream)?;

    tracing::info!(status = %upstream.status, "Relayed get");
    state.respond(&headers, upstream)
}

#[instrument(name = "ui.set", skip_all, fields(component = "ui", key = tracing::field::Empty))]
async fn set_value(
    State(state): State<UiState>,
    headers: HeaderMap,
    query: KeyParams,
    body: Bytes,
) -> Result<Response, RelayError> {
    let form = if is_form(&headers) {
        KeyParams::parse(&body)
    } else {
        KeyParams::default()
    };
    let params = form.or(query);
    tracing::Span::current().record("key", params.key());

    let upstream = state
        .inner
        .upstream
        .post(
            params.key().unwrap_or_default(),
            params.value().unwrap_or_default(),
        )
        .await
        .map_err(RelayError::Upstream)?;

    tracing::info!(key = params.key(), status = %upstream.status, "Relayed set");
    state.respond(&headers, upstream)
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;
    use crate::http::relay::{self, RelayState, ResponseFormat};
    use crate::observability::TracePropagator;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    /// UI wired to a frontend-style relay with its own store, served on an
    /// ephemeral port.
    async fn app() -> Router {
        let relay = relay::router(RelayState::new(
            Role::Frontend,
            Arc::new(MemoryStore::new()),
            ResponseFormat::Plain,
            Duration::ZERO,
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, relay).await.unwrap();
        });

        let upstream = UpstreamClient::new(
            Url::parse(&format!("http://{}", addr)).unwrap(),
            TracePropagator::new(),
        );
        router(UiState::new(upstream).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_html(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_home_renders_form() {
        let (status, body) = send(&app().await, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<form method="POST" action="/set">"#));
        assert!(body.contains(r#"<form method="GET" action="/get">"#));
        assert!(!body.contains("Response ("));
    }

    #[tokio::test]
    async fn test_set_query_then_get_raw() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set?key=a&value=1")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, get("/get?key=a")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1");

        let (status, body) = send(&app, get("/get?key=b")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "key not found");
    }

    #[tokio::test]
    async fn test_set_form_body() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "text/html")
            .body(Body::from("key=color&value=blue"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Response (204 No Content)"));

        let (_, body) = send(&app, get("/get?key=color")).await;
        assert_eq!(body, "blue");
    }

    #[tokio::test]
    async fn test_form_body_wins_over_query() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set?key=from-query&value=q")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("key=from-form&key=second"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Key from the body, value filled in from the query.
        let (_, body) = send(&app, get("/get?key=from-form")).await;
        assert_eq!(body, "q");
        let (status, _) = send(&app, get("/get?key=from-query")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_form_body_ignored() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set?key=a&value=1")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("key=b&value=2"))
            .unwrap();
        send(&app, request).await;

        let (_, body) = send(&app, get("/get?key=a")).await;
        assert_eq!(body, "1");
    }

    #[tokio::test]
    async fn test_repeated_query_parameters() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set?key=a&key=b&value=1&value=2")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, get("/get?key=a&key=b")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1");
    }

    #[tokio::test]
    async fn test_html_echoes_escaped_body() {
        let app = app().await;

        let request = Request::builder()
            .method(Method::POST)
            .uri("/set?key=k&value=%3Cb%3Ebold%3C%2Fb%3E")
            .body(Body::empty())
            .unwrap();
        send(&app, request).await;

        let (status, body) = send(&app, get_html("/get?key=k")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Response (200 OK)"));
        assert!(body.contains("&lt;b&gt;bold&lt;&#x2f;b&gt;") || body.contains("&lt;b&gt;bold&lt;/b&gt;"));

        let (status, body) = send(&app, get_html("/get?key=missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("key not found"));
    }

    #[tokio::test]
    async fn test_missing_key_surfaces_bad_request() {
        let (status, body) = send(&app().await, get("/get")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "missing key");
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let app = app().await;

        let (status, body) = send(&app, get("/set?key=a&value=1")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, "method not allowed");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/get?key=a")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
