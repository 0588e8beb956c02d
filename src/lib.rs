//! HTTP throughput test server library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod transfer;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
