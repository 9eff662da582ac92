//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use kv_relay::config::{RelayConfig, Role};
use kv_relay::http::HttpServer;
use kv_relay::lifecycle::Shutdown;
use kv_relay::observability::TracePropagator;

/// A service of the chain running on an ephemeral port.
pub struct RunningService {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl RunningService {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Config for `role` pointed at `upstream`, bound to a free local port.
pub fn config_for(role: Role, upstream: Option<String>) -> RelayConfig {
    let mut config = RelayConfig::for_role(role);
    config.service.bind_address = Some("127.0.0.1:0".into());
    config.service.upstream_url = upstream;
    config
}

pub async fn spawn_service(config: RelayConfig) -> RunningService {
    let listener = TcpListener::bind(config.service.bind_address())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, TracePropagator::new()).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningService { addr, shutdown }
}

/// UI → frontend → backend, all on ephemeral ports.
pub struct Chain {
    pub ui: RunningService,
    pub frontend: RunningService,
    pub backend: RunningService,
}

pub async fn spawn_chain() -> Chain {
    let backend = spawn_service(config_for(Role::Backend, None)).await;
    let frontend = spawn_service(config_for(Role::Frontend, Some(backend.url()))).await;
    let ui = spawn_service(config_for(Role::Ui, Some(frontend.url()))).await;
    Chain {
        ui,
        frontend,
        backend,
    }
}

/// Address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Raw TCP upstream answering with whatever the handler returns, recording
/// each request head it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request heads received so far, header names as sent on the wire.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable mock upstream. The handler sees the request head and
/// returns status and body.
pub async fn start_programmable_backend<F>(f: F) -> MockUpstream
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(&head);
                recorded.lock().unwrap().push(head);

                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream { addr, requests }
}

/// Mock upstream that always answers with the same status and body.
pub async fn start_mock_backend(status: u16, body: &'static str) -> MockUpstream {
    start_programmable_backend(move |_| (status, body.to_string())).await
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
