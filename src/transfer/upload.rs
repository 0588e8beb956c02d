//! Capped upload draining.

use std::fmt::Display;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::time::Instant;

/// Reasons an upload body was not fully consumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("body exceeds {limit} bytes (read {bytes_read})")]
    TooLarge { limit: u64, bytes_read: u64 },

    #[error("declared content length {declared} exceeds {limit} bytes")]
    DeclaredTooLarge { limit: u64, declared: u64 },

    #[error("read failed after {bytes_read} bytes: {reason}")]
    Read { bytes_read: u64, reason: String },

    #[error("read deadline exceeded after {bytes_read} bytes")]
    TimedOut { bytes_read: u64 },
}

impl UploadError {
    /// Bytes consumed before the upload was abandoned.
    pub fn bytes_read(&self) -> u64 {
        match self {
            UploadError::TooLarge { bytes_read, .. }
            | UploadError::Read { bytes_read, .. }
            | UploadError::TimedOut { bytes_read } => *bytes_read,
            UploadError::DeclaredTooLarge { .. } => 0,
        }
    }
}

/// Reject a body whose declared length is already over the limit.
pub fn check_declared_length(declared: Option<u64>, limit: u64) -> Result<(), UploadError> {
    match declared {
        Some(declared) if declared > limit => {
            Err(UploadError::DeclaredTooLarge { limit, declared })
        }
        _ => Ok(()),
    }
}

/// Read `body` to the end and discard it, returning the byte count.
///
/// Fails as soon as more than `limit` bytes have arrived, so at most one
/// frame past the limit is ever held. The optional `deadline` bounds the
/// whole read.
pub async fn drain_capped<S, E>(
    body: S,
    limit: u64,
    deadline: Option<Instant>,
) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut bytes_read: u64 = 0;

    loop {
        let frame = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, body.next())
                .await
                .map_err(|_| UploadError::TimedOut { bytes_read })?,
            None => body.next().await,
        };
        let Some(frame) = frame else {
            return Ok(bytes_read);
        };

        let chunk = frame.map_err(|e| UploadError::Read {
            bytes_read,
            reason: e.to_string(),
        })?;
        bytes_read += chunk.len() as u64;
        if bytes_read > limit {
            return Err(UploadError::TooLarge { limit, bytes_read });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::io;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let frames: Vec<_> = sizes.iter().map(|&n| Ok(Bytes::from(vec![7u8; n]))).collect();
        stream::iter(frames)
    }

    #[tokio::test]
    async fn drains_body_under_limit() {
        assert_eq!(drain_capped(chunks(&[10, 20, 30]), 100, None).await, Ok(60));
    }

    #[tokio::test]
    async fn body_exactly_at_limit_is_accepted() {
        assert_eq!(drain_capped(chunks(&[50, 50]), 100, None).await, Ok(100));
    }

    #[tokio::test]
    async fn empty_body_is_accepted() {
        assert_eq!(drain_capped(chunks(&[]), 100, None).await, Ok(0));
    }

    #[tokio::test]
    async fn one_byte_over_is_rejected() {
        assert_eq!(
            drain_capped(chunks(&[50, 51]), 100, None).await,
            Err(UploadError::TooLarge { limit: 100, bytes_read: 101 })
        );
    }

    #[tokio::test]
    async fn stops_polling_huge_stream_after_limit() {
        // 1 TiB worth of 64 KiB frames; only the first few may be pulled.
        let polled = Arc::new(AtomicU64::new(0));
        let counter = polled.clone();
        let frame = Bytes::from(vec![0u8; 64 * 1024]);
        let huge = stream::repeat_with(move || {
            counter.fetch_add(frame.len() as u64, Ordering::Relaxed);
            Ok::<_, io::Error>(frame.clone())
        })
        .take(16 * 1024 * 1024);

        let limit = 1024 * 1024;
        let err = drain_capped(huge, limit, None).await.unwrap_err();

        assert!(matches!(err, UploadError::TooLarge { .. }));
        assert!(polled.load(Ordering::Relaxed) <= limit + 64 * 1024);
    }

    #[tokio::test]
    async fn read_fault_reports_progress() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"abcd")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);
        match drain_capped(body, 100, None).await {
            Err(UploadError::Read { bytes_read, reason }) => {
                assert_eq!(bytes_read, 4);
                assert!(reason.contains("reset"));
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_hits_deadline() {
        let body = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"xy"))])
            .chain(stream::pending());
        let deadline = Instant::now() + Duration::from_secs(30);

        let err = drain_capped(body, 100, Some(deadline)).await.unwrap_err();
        assert_eq!(err, UploadError::TimedOut { bytes_read: 2 });
    }

    #[test]
    fn declared_length_checked_against_limit() {
        assert!(check_declared_length(None, 10).is_ok());
        assert!(check_declared_length(Some(10), 10).is_ok());
        assert_eq!(
            check_declared_length(Some(11), 10),
            Err(UploadError::DeclaredTooLarge { limit: 10, declared: 11 })
        );
    }
}
