//! `kv-relay`: one service of the key/value relay chain.
//!
//! ```text
//! kv-relay --role backend
//! kv-relay --role frontend --upstream http://localhost:4041
//! kv-relay --role ui --upstream http://localhost:4040
//! kv-relay --config config/frontend.toml
//! ```
//!
//! Command-line flags override the config file, which overrides the role
//! defaults.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use kv_relay::config::{load_config, validate_config, ConfigError, RelayConfig, Role};
use kv_relay::lifecycle::{self, Shutdown};
use kv_relay::observability::{init_telemetry, logging, metrics, TracePropagator};

#[derive(Parser)]
#[command(name = "kv-relay", version)]
#[command(about = "Key/value relay chain service", long_about = None)]
struct Args {
    /// Role this process plays in the chain.
    #[arg(short, long, value_enum)]
    role: Option<Role>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:4040.
    #[arg(short, long)]
    bind: Option<String>,

    /// Base URL of the next hop.
    #[arg(short, long)]
    upstream: Option<String>,
}

impl Args {
    fn resolve(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::for_role(self.role.unwrap_or_default()),
        };

        if let Some(role) = self.role {
            config.service.role = role;
        }
        if let Some(bind) = &self.bind {
            config.service.bind_address = Some(bind.clone());
        }
        if let Some(upstream) = &self.upstream {
            config.service.upstream_url = Some(upstream.clone());
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = args.resolve()?;
    let role = config.service.role;

    // The OTLP exporter builds a blocking HTTP client, which must not happen
    // inside the async runtime.
    let telemetry = init_telemetry(role, &config.observability.tracing)?;
    logging::init_logging(&config.observability, Some(telemetry.tracer()))?;

    tracing::info!(
        component = %role,
        version = env!("CARGO_PKG_VERSION"),
        exporter = ?config.observability.tracing.exporter,
        "kv-relay starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(config));
    drop(runtime);

    if let Err(e) = telemetry.shutdown() {
        tracing::warn!(component = %role, error = %e, "Failed to flush spans");
    }
    result
}

async fn serve(config: RelayConfig) -> Result<(), Box<dyn Error>> {
    let role = config.service.role;
    let shutdown_timeout = Duration::from_secs(config.timeouts.shutdown_secs);

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let (server, listener) = lifecycle::start(config, TracePropagator::new()).await?;

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            return result?.map_err(Into::into);
        }
        _ = lifecycle::wait_for_signal() => {}
    }

    shutdown.trigger();
    match tokio::time::timeout(shutdown_timeout, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            component = %role,
            timeout_secs = shutdown_timeout.as_secs(),
            "Drain timed out, dropping in-flight requests"
        ),
    }

    tracing::info!(component = %role, "Shutdown complete");
    Ok(())
}
