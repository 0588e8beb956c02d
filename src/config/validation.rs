//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! relations. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("limits.default_download_bytes ({default}) exceeds limits.max_download_bytes ({max})")]
    DefaultAboveMax { default: u64, max: u64 },
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let limits = &config.limits;
    let timeouts = &config.timeouts;
    let non_zero = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("limits.max_upload_bytes", limits.max_upload_bytes),
        ("limits.max_download_bytes", limits.max_download_bytes),
        ("limits.default_download_bytes", limits.default_download_bytes),
        ("limits.buffer_size", limits.buffer_size as u64),
        ("timeouts.read_secs", timeouts.read_secs),
        ("timeouts.write_secs", timeouts.write_secs),
        ("timeouts.idle_secs", timeouts.idle_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if limits.default_download_bytes > limits.max_download_bytes {
        errors.push(ValidationError::DefaultAboveMax {
            default: limits.default_download_bytes,
            max: limits.max_download_bytes,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
