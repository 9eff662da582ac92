//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a relay
//! service. All types derive Serde traits for deserialization from config files.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Role a `kv-relay` process plays in the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// HTML form in front of the chain.
    Ui,
    /// Relay that forwards to the back-end.
    #[default]
    Frontend,
    /// Relay holding the in-memory store.
    Backend,
}

impl Role {
    /// Name used for logs, metrics labels and the trace resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ui => "ui",
            Role::Frontend => "frontend",
            Role::Backend => "backend",
        }
    }

    pub fn default_bind_address(&self) -> &'static str {
        match self {
            Role::Ui => "0.0.0.0:8080",
            Role::Frontend => "0.0.0.0:4040",
            Role::Backend => "0.0.0.0:4041",
        }
    }

    /// Next hop in the chain, if this role has one.
    pub fn default_upstream_url(&self) -> Option<&'static str> {
        match self {
            Role::Ui => Some("http://localhost:4040"),
            Role::Frontend => Some("http://localhost:4041"),
            Role::Backend => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration for a relay service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Role, bind address and upstream.
    pub service: ServiceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Logging, metrics and trace export.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Default configuration for the given role.
    pub fn for_role(role: Role) -> Self {
        let mut config = Self::default();
        config.service.role = role;
        config
    }
}

/// Service identity and wiring.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub role: Role,

    /// Bind address (e.g., "0.0.0.0:4040"). Falls back to the role default.
    pub bind_address: Option<String>,

    /// Base URL of the next hop. Falls back to the role default.
    pub upstream_url: Option<String>,

    /// Artificial delay before each relayed request is dispatched.
    pub simulated_latency_ms: u64,
}

impl ServiceConfig {
    pub fn bind_address(&self) -> &str {
        self.bind_address
            .as_deref()
            .unwrap_or_else(|| self.role.default_bind_address())
    }

    pub fn upstream_url(&self) -> Option<&str> {
        match self.role {
            Role::Backend => None,
            _ => self
                .upstream_url
                .as_deref()
                .or_else(|| self.role.default_upstream_url()),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request/response in seconds.
    pub request_secs: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            shutdown_secs: 10,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Span export settings.
    pub tracing: TracingConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            tracing: TracingConfig::default(),
        }
    }
}

/// Where finished spans are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceExporter {
    /// OTLP over HTTP/protobuf.
    #[default]
    Otlp,
    /// Pretty-printed to stdout.
    Stdout,
    /// Spans are still created and propagated, but never exported.
    None,
}

/// Trace export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    pub exporter: TraceExporter,

    /// OTLP traces endpoint.
    pub endpoint: String,

    /// Fraction of root traces sampled (1.0 = all).
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            exporter: TraceExporter::Otlp,
            endpoint: "http://127.0.0.1:4318/v1/traces".to_string(),
            sample_ratio: 1.0,
        }
    }
}
