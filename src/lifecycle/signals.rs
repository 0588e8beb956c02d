//! OS signal handling.
//!
//! SIGINT and SIGTERM both trigger graceful shutdown. Uses Tokio's signal
//! handling, so handlers are async-safe.

use std::io;

use crate::lifecycle::Shutdown;

/// Wait for the first termination signal and return its name.
#[cfg(unix)]
pub async fn termination() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for the first termination signal and return its name.
#[cfg(not(unix))]
pub async fn termination() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Trigger `shutdown` on the first termination signal.
///
/// If handlers cannot be installed the server keeps running and only a
/// programmatic trigger stops it.
pub async fn forward_termination(shutdown: Shutdown) {
    match termination().await {
        Ok(signal) => {
            tracing::info!(signal, "Received termination signal");
            shutdown.trigger();
        }
        Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
    }
}
