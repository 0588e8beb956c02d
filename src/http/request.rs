//! Per-request context extracted before a handler runs.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Resolve a best-effort client identity for log lines
//! - Expose the connection's cancellation token to handlers
//!
//! # Design Decisions
//! - Client identity comes from client-controlled headers and is spoofable.
//!   It is only ever logged, never used to admit or deny a request.
//! - Every extractor here is infallible; missing data degrades to a default

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Request};
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestId, RequestId};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Client address headers, checked in this order.
const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Best-effort originating client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl std::fmt::Display for ClientIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the client address from proxy headers, falling back to the peer.
///
/// Order: `CF-Connecting-IP`, first entry of `X-Forwarded-For`, `X-Real-IP`,
/// then the transport address without its port. Empty or non-UTF-8 header
/// values are skipped.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    if let Some(ip) = header(headers, CF_CONNECTING_IP) {
        return ip.to_string();
    }
    if let Some(ip) = header(headers, X_FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }
    if let Some(ip) = header(headers, X_REAL_IP) {
        return ip.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(resolve_client_ip(&parts.headers, peer)))
    }
}

/// Cancellation token of the connection a request arrived on.
///
/// The connection task inserts it as a request extension; it fires when the
/// connection ends or the server gives up waiting during shutdown. Requests
/// without one (e.g. driven directly through the router) get a fresh token
/// that never fires.
#[derive(Debug, Clone, Default)]
pub struct RequestCancel(pub CancellationToken);

impl RequestCancel {
    pub fn token(&self) -> CancellationToken {
        self.0.clone()
    }
}

impl<S> FromRequestParts<S> for RequestCancel
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestCancel>()
            .cloned()
            .unwrap_or_default())
    }
}
