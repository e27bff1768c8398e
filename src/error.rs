//! Error types for the client session core.
//!
//! Fallible operations return `Result<T, SessionError>`. Three classes of
//! failure are kept apart: protocol-fatal errors that end the session,
//! transport write failures surfaced by [`ProtocolWriter`] implementations,
//! and the distinguished [`SessionError::Terminated`] raised when the host
//! asks to shut down during a blocking wait. Rejected negotiations (for
//! example a refused resize request) are logged and absorbed internally and
//! never appear here.
//!
//! [`ProtocolWriter`]: crate::messages::ProtocolWriter

use thiserror::Error;

/// The canonical error type for the session core.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Protocol errors ──────────────────────────────────────────
    /// The server sent a message that is illegal in the negotiated state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// The server closed the connection cleanly.
    #[error("connection closed by server")]
    EndOfStream,

    /// A numeric wire value did not map to any known enum variant.
    #[error("unknown {type_name} value: {value}")]
    UnknownValue { type_name: &'static str, value: i64 },

    // ── Transport errors ─────────────────────────────────────────
    /// The outbound transport reported an I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound message channel was closed.
    #[error("message channel closed")]
    ChannelClosed,

    // ── Shutdown ─────────────────────────────────────────────────
    /// The host requested termination while the session was waiting.
    ///
    /// This is a clean shutdown signal, not a failure; hosts should
    /// check [`SessionError::is_termination`] before reporting errors.
    #[error("termination requested")]
    Terminated,
}

impl SessionError {
    /// True for the cooperative-shutdown signal, which callers should
    /// treat as a normal exit rather than a failure.
    pub fn is_termination(&self) -> bool {
        matches!(self, SessionError::Terminated)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SessionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SessionError::ChannelClosed
    }
}
