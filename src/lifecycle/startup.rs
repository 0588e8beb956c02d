//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (metrics, listener, server)
//! - Start the signal waiter
//! - Run the server to completion
//!
//! # Design Decisions
//! - Fail fast: a bind error is fatal
//! - Listener binds last, so traffic only arrives when everything is ready

use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::net::Listener;
use crate::observability::metrics;

/// Bring the server up, serve until a termination signal, then drain.
pub async fn launch(config: ServerConfig) -> Result<(), ServerError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        max_upload_bytes = config.limits.max_upload_bytes,
        max_download_bytes = config.limits.max_download_bytes,
        buffer_size = config.limits.buffer_size,
        timeout_secs = config.timeouts.idle_secs,
        pid = std::process::id(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::forward_termination(shutdown));

    server.run(listener, server_shutdown).await
}
