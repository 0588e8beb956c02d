//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → metrics → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: connections still open after the grace period
//!   are cancelled and the process exits non-zero

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

/// Server lifecycle phase.
///
/// ```text
/// Starting → Serving → ShuttingDown → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Router built, listener not yet serving.
    Starting,
    /// Accepting and serving connections.
    Serving,
    /// No longer accepting; in-flight requests are finishing.
    ShuttingDown,
    /// Terminal.
    Stopped,
}
