//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, Axum router, middleware)
//!     → request.rs (request ID, client identity, cancellation token)
//!     → handlers.rs (/upload, /download, /health)
//!     → response.rs (error → status code + body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{resolve_client_ip, ClientIp, RequestCancel, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer, ServerError};
