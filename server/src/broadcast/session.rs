use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque handle for one connected viewer, unique for the life of the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("viewer connection closed")]
    Closed,

    #[error("send timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Write half of a viewer connection.
///
/// The broadcaster only ever pushes text frames and, on eviction or
/// shutdown, closes the connection. Implementations serialize their own
/// writes; concurrent callers must not interleave frames.
#[async_trait]
pub trait ViewerSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), SessionError>;

    /// Best-effort close. Errors are swallowed; the peer may already be gone.
    async fn close(&self);
}
