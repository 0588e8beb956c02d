//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create the Axum Router with the three fixed routes
//! - Wire up middleware (tracing, request ID)
//! - Accept connections and serve each as HTTP/1.1 on its own task
//! - Apply the idle/header-read timeout to every connection
//! - Drain connections on shutdown, force-close after the grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::routing::{any, get, post};
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_io_timeout::TimeoutStream;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::request::{RequestCancel, RequestUuid, X_REQUEST_ID};
use crate::lifecycle::LifecyclePhase;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{in_flight} connection(s) still open after {grace:?} grace period, forced shutdown")]
    ShutdownTimeout { grace: Duration, in_flight: u64 },
}

/// HTTP server for the three test endpoints.
pub struct HttpServer {
    router: Router,
    config: Arc<ServerConfig>,
    phase: watch::Sender<LifecyclePhase>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            config: config.clone(),
        };
        let (phase, _) = watch::channel(LifecyclePhase::Starting);

        Self {
            router: Self::build_router(state),
            config,
            phase,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/upload", post(handlers::upload))
            .route("/download", get(handlers::download))
            .route("/health", any(handlers::health))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, RequestUuid))
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Observe lifecycle phase changes.
    pub fn phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// Run the server until `shutdown` fires, then drain.
    ///
    /// A channel that closes without firing leaves the server running.
    ///
    /// Returns `Ok` when every connection finished within the grace period and
    /// [`ServerError::ShutdownTimeout`] when some had to be cut off.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let tracker = ConnectionTracker::new();
        let force = CancellationToken::new();
        let mut connections = JoinSet::new();

        self.phase.send_replace(LifecyclePhase::Serving);
        tracing::info!(
            address = %addr,
            timeout_secs = self.config.timeouts.idle_secs,
            endpoints = "/upload /download /health",
            "HTTP server starting"
        );

        let mut shutdown_open = true;
        loop {
            tokio::select! {
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                    Err(RecvError::Closed) => {
                        // No trigger can arrive any more; keep serving.
                        tracing::warn!("Shutdown channel closed without a signal");
                        shutdown_open = false;
                    }
                },
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let conn = ConnectionContext {
                            router: self.router.clone(),
                            idle_timeout: self.config.timeouts.idle(),
                            write_timeout: self.config.timeouts.write(),
                            drain: tracker.drain_receiver(),
                            cancel: force.child_token(),
                            guard: tracker.track(),
                            _permit: permit,
                        };
                        connections.spawn(serve_connection(stream, peer, conn));
                    }
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
            while connections.try_join_next().is_some() {}
        }

        self.phase.send_replace(LifecyclePhase::ShuttingDown);
        drop(listener);
        tracker.begin_drain();

        let grace = self.config.timeouts.shutdown_grace();
        tracing::info!(
            in_flight = tracker.active_count(),
            grace_secs = grace.as_secs(),
            "Draining connections"
        );

        let drained = tokio::time::timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        let result = match drained {
            Ok(()) => {
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                let in_flight = tracker.active_count();
                force.cancel();
                connections.shutdown().await;
                Err(ServerError::ShutdownTimeout { grace, in_flight })
            }
        };

        self.phase.send_replace(LifecyclePhase::Stopped);
        result
    }
}

/// Everything a connection task owns besides its socket.
struct ConnectionContext {
    router: Router,
    idle_timeout: Duration,
    write_timeout: Duration,
    drain: watch::Receiver<bool>,
    cancel: CancellationToken,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

/// Serve HTTP/1.1 requests on one connection until it closes or drains.
async fn serve_connection(stream: TcpStream, peer: SocketAddr, conn: ConnectionContext) {
    let ConnectionContext {
        router,
        idle_timeout,
        write_timeout,
        mut drain,
        cancel,
        guard,
        _permit,
    } = conn;
    let connection_id = guard.id();
    tracing::debug!(connection_id = %connection_id, peer = %peer, "Connection opened");

    let request_cancel = cancel.clone();
    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request
            .extensions_mut()
            .insert(RequestCancel(request_cancel.clone()));
        router.clone().call(request)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(idle_timeout)
        .keep_alive(true);
    // A peer that stops reading fails the pending write instead of holding
    // the connection slot.
    let mut stream = TimeoutStream::new(stream);
    stream.set_write_timeout(Some(write_timeout));
    let connection = builder.serve_connection(TokioIo::new(Box::pin(stream)), service);
    tokio::pin!(connection);

    let mut draining = *drain.borrow_and_update();
    if draining {
        connection.as_mut().graceful_shutdown();
    }

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
                }
                break;
            }
            _ = drain.changed(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }

    // Anything still streaming on this connection is now pointless.
    cancel.cancel();
}
