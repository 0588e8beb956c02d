//! Transfer engine: the byte-moving core behind `/upload` and `/download`.
//!
//! # Data Flow
//! ```text
//! POST /upload
//!     → upload.rs (declared length check, capped drain to nowhere)
//!
//! GET /download?size=N
//!     → download.rs (DownloadPlan validation)
//!     → DownloadStream (fixed chunk, cancellation + deadline per chunk)
//!     → response body frames
//! ```
//!
//! # Design Decisions
//! - Nothing here knows about HTTP; handlers adapt bodies to streams
//! - Memory per transfer is bounded by one chunk/frame
//! - Cancellation is cooperative and only observed between chunks

pub mod download;
pub mod upload;

pub use download::{DownloadPlan, DownloadStream, SizeError};
pub use upload::{check_declared_length, drain_capped, UploadError};
