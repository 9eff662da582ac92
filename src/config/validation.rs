//! Configuration validation.
//!
//! Serde handles syntax; this module checks that the values make sense
//! together. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, TraceExporter};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bind = config.service.bind_address();
    if bind.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "service.bind_address",
            format!("'{}' is not a socket address", bind),
        ));
    }

    if let Some(upstream) = config.service.upstream_url() {
        match Url::parse(upstream) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
                "service.upstream_url",
                format!("unsupported scheme '{}', only http is supported", url.scheme()),
            )),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::new(
                "service.upstream_url",
                format!("'{}' has no host", upstream),
            )),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                "service.upstream_url",
                format!("'{}' is not a valid URL: {}", upstream, e),
            )),
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_body_bytes",
            "must be greater than zero",
        ));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!(
                "unknown level '{}', expected one of {}",
                observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let tracing = &observability.tracing;
    if tracing.exporter == TraceExporter::Otlp {
        if let Err(e) = Url::parse(&tracing.endpoint) {
            errors.push(ValidationError::new(
                "observability.tracing.endpoint",
                format!("'{}' is not a valid URL: {}", tracing.endpoint, e),
            ));
        }
    }

    if !(0.0..=1.0).contains(&tracing.sample_ratio) {
        errors.push(ValidationError::new(
            "observability.tracing.sample_ratio",
            format!("{} is outside 0.0..=1.0", tracing.sample_ratio),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
