//! Shared utilities for integration tests.

use std::net::SocketAddr;

use echo_stream::config::ServerConfig;
use echo_stream::http::{HttpServer, ServerError};
use echo_stream::lifecycle::{LifecyclePhase, Shutdown};
use echo_stream::net::Listener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A server running on an ephemeral local port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub phase: watch::Receiver<LifecyclePhase>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server with defaults adjusted by `configure`.
///
/// The listener is bound before this returns, so requests can be sent
/// immediately.
pub async fn start_server(configure: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    configure(&mut config);

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let phase = server.phase();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, server_shutdown));

    TestServer {
        addr,
        shutdown,
        phase,
        handle,
    }
}

/// Client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
