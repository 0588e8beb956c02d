//! Error responses.
//!
//! Maps transfer errors onto status codes and the plain-text bodies clients
//! see. Client mistakes are 4xx and never reported as server faults.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::transfer::{SizeError, UploadError};

/// Errors a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid size parameter")]
    InvalidSize,

    #[error("size must be between 1 and {max} bytes")]
    SizeOutOfRange { max: u64 },

    #[error("Request too large or processing error")]
    Upload(#[from] UploadError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidSize | ApiError::SizeOutOfRange { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upload(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<SizeError> for ApiError {
    fn from(err: SizeError) -> Self {
        match err {
            SizeError::Invalid(_) => ApiError::InvalidSize,
            SizeError::OutOfRange { max, .. } => ApiError::SizeOutOfRange { max },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}
