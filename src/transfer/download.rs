//! Sized download generation.
//!
//! A [`DownloadPlan`] is validated from the `size` query parameter before any
//! byte is written. [`DownloadStream`] then yields exactly `plan.size()` bytes
//! in `buffer_size` chunks, checking its cancellation token and write deadline
//! at every chunk boundary.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::LimitsConfig;
use crate::observability::metrics;

/// Rejection of a requested download size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("size '{0}' is not an integer")]
    Invalid(String),

    #[error("size {requested} outside 1..={max}")]
    OutOfRange { requested: i64, max: u64 },
}

/// A validated download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPlan {
    size: u64,
}

impl DownloadPlan {
    /// Validate the raw `size` parameter against the configured limits.
    ///
    /// Missing or empty parameters select the default size. Anything else must
    /// be a bare integer, whitespace included. The upper bound
    /// is inclusive; zero and negative values are rejected.
    pub fn from_param(raw: Option<&str>, limits: &LimitsConfig) -> Result<Self, SizeError> {
        let raw = match raw {
            None | Some("") => {
                return Ok(Self {
                    size: limits.default_download_bytes,
                })
            }
            Some(raw) => raw,
        };

        let requested: i64 = raw
            .parse()
            .map_err(|_| SizeError::Invalid(raw.to_string()))?;

        match u64::try_from(requested) {
            Ok(size) if size > 0 && size <= limits.max_download_bytes => Ok(Self { size }),
            _ => Err(SizeError::OutOfRange {
                requested,
                max: limits.max_download_bytes,
            }),
        }
    }

    /// Total number of bytes the response carries.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Why a download stopped before reaching its planned size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Cancelled,
    DeadlineExceeded,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Body stream producing the bytes of one [`DownloadPlan`].
///
/// The chunk buffer is allocated once and re-sliced for every frame, so the
/// stream never holds more than one buffer regardless of the total size.
pub struct DownloadStream {
    chunk: Bytes,
    total: u64,
    sent: u64,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    client: String,
    outcome: Option<Outcome>,
}

impl DownloadStream {
    pub fn new(plan: DownloadPlan, buffer_size: usize, cancel: CancellationToken) -> Self {
        Self {
            chunk: Bytes::from(vec![0u8; buffer_size.max(1)]),
            total: plan.size(),
            sent: 0,
            cancel,
            deadline: None,
            client: String::new(),
            outcome: None,
        }
    }

    /// Stop producing chunks once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Client identity used in log lines.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Bytes handed to the transport so far.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        metrics::record_download(outcome.as_str(), self.sent);
        match outcome {
            Outcome::Completed => tracing::info!(
                client = %self.client,
                bytes_sent = self.sent,
                "Download completed"
            ),
            Outcome::Cancelled => tracing::info!(
                client = %self.client,
                bytes_sent = self.sent,
                total = self.total,
                "Download cancelled"
            ),
            Outcome::DeadlineExceeded => tracing::warn!(
                client = %self.client,
                bytes_sent = self.sent,
                total = self.total,
                "Download write deadline exceeded"
            ),
        }
    }
}

impl Stream for DownloadStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome.is_some() {
            return Poll::Ready(None);
        }
        if this.sent >= this.total {
            this.finish(Outcome::Completed);
            return Poll::Ready(None);
        }
        if this.cancel.is_cancelled() {
            this.finish(Outcome::Cancelled);
            return Poll::Ready(None);
        }
        if this.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            this.finish(Outcome::DeadlineExceeded);
            return Poll::Ready(None);
        }

        let remaining = this.total - this.sent;
        let len = remaining.min(this.chunk.len() as u64) as usize;
        this.sent += len as u64;
        Poll::Ready(Some(Ok(this.chunk.slice(..len))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.outcome.is_some() {
            return (0, Some(0));
        }
        let remaining = self.total - self.sent;
        let chunks = remaining.div_ceil(self.chunk.len() as u64) as usize;
        (0, Some(chunks))
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        // The transport drops the body early when the peer goes away or a
        // write fails.
        if self.outcome.is_none() && self.sent < self.total {
            metrics::record_download("interrupted", self.sent);
            tracing::info!(
                client = %self.client,
                bytes_sent = self.sent,
                total = self.total,
                "Download interrupted"
            );
        }
    }
}
