//! Endpoint handlers: `/upload`, `/download`, `/health`.

use std::time::Instant;

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};

use crate::http::request::{ClientIp, RequestCancel};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::transfer::{check_declared_length, drain_capped, DownloadPlan, DownloadStream, UploadError};

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Read the request body to the end and throw it away.
///
/// `POST /upload` → 200 `ok`, or 413 when the body is over the limit, the
/// read deadline passes, or the stream breaks.
pub async fn upload(
    State(state): State<AppState>,
    client: ClientIp,
    request: Request,
) -> Result<&'static str, ApiError> {
    let limit = state.config.limits.max_upload_bytes;
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    tracing::info!(
        client = %client,
        method = %request.method(),
        path = %request.uri().path(),
        content_length = ?declared,
        user_agent = user_agent(request.headers()),
        "Upload request"
    );

    let deadline = tokio::time::Instant::now() + state.config.timeouts.read();
    let result = match check_declared_length(declared, limit) {
        Ok(()) => drain_capped(request.into_body().into_data_stream(), limit, Some(deadline)).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes_received) => {
            metrics::record_upload("ok", bytes_received);
            tracing::info!(client = %client, bytes_received, "Upload completed");
            Ok("ok")
        }
        Err(err) => {
            let outcome = match err {
                UploadError::TooLarge { .. } | UploadError::DeclaredTooLarge { .. } => "too_large",
                UploadError::Read { .. } => "read_error",
                UploadError::TimedOut { .. } => "timed_out",
            };
            metrics::record_upload(outcome, err.bytes_read());
            tracing::warn!(
                client = %client,
                error = %err,
                bytes_read = err.bytes_read(),
                "Upload rejected"
            );
            Err(err.into())
        }
    }
}

/// First `size` value of the query string. Later repeats are ignored.
fn size_param(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(name, _)| name == "size")
        .map(|(_, value)| value.as_str())
}

/// Stream `size` bytes back to the client.
///
/// `GET /download?size=N` → 200 with `Content-Length: N`, or 400 when `size`
/// is not an integer in range. The body stops early, without error, when the
/// connection is cancelled or the write deadline passes. `HEAD` gets the
/// headers only.
pub async fn download(
    State(state): State<AppState>,
    client: ClientIp,
    cancel: RequestCancel,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let limits = &state.config.limits;
    let size = size_param(&params);

    tracing::info!(
        client = %client,
        method = %method,
        path = %uri.path(),
        requested_size = size.unwrap_or("default"),
        user_agent = user_agent(&headers),
        "Download request"
    );

    let plan = DownloadPlan::from_param(size, limits).map_err(|e| {
        tracing::warn!(client = %client, error = %e, "Download rejected");
        ApiError::from(e)
    })?;

    if method == Method::HEAD {
        return Ok(download_response(Body::empty(), plan.size()));
    }

    tracing::info!(client = %client, total_size = plan.size(), "Download started");

    let deadline = Instant::now() + state.config.timeouts.write();
    let stream = DownloadStream::new(plan, limits.buffer_size, cancel.token())
        .with_deadline(deadline)
        .with_client(client.0);

    Ok(download_response(Body::from_stream(stream), plan.size()))
}

fn download_response(body: Body, size: u64) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    response
}

/// Liveness probe: always 200 `healthy`, any method.
pub async fn health(client: ClientIp, method: Method, uri: Uri, headers: HeaderMap) -> impl IntoResponse {
    metrics::record_health_check();
    tracing::info!(
        client = %client,
        method = %method,
        path = %uri.path(),
        user_agent = user_agent(&headers),
        "Health check"
    );
    ([(CONTENT_TYPE, "text/plain")], "healthy")
}
