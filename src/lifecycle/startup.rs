//! Startup orchestration.
//!
//! Builds the server for the configured role and binds its listener. Any
//! error here is fatal.

use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::http::{HttpServer, ServerError};
use crate::observability::TracePropagator;

/// Build the server, then bind its listener.
pub async fn start(
    config: RelayConfig,
    propagator: TracePropagator,
) -> Result<(HttpServer, TcpListener), ServerError> {
    let role = config.service.role;
    let bind_address = config.service.bind_address().to_string();

    tracing::info!(
        component = %role,
        bind_address = %bind_address,
        upstream = config.service.upstream_url(),
        simulated_latency_ms = config.service.simulated_latency_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let server = HttpServer::new(config, propagator)?;

    let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
        tracing::error!(component = %role, bind_address = %bind_address, error = %e, "Failed to bind listener");
        e
    })?;
    tracing::info!(component = %role, address = %listener.local_addr()?, "Listening for connections");

    Ok((server, listener))
}
