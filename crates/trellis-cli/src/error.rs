//! Error types for interactive sessions and file streaming.

use thiserror::Error;

/// Result type alias for session and archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the terminal, session and archive layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Standard input is not attached to a terminal.
    #[error("no controlling terminal available")]
    TerminalUnavailable,

    /// The terminal rejected a mode change.
    #[error("failed to change terminal mode: {0}")]
    TerminalMode(#[source] std::io::Error),

    /// The terminal size could not be queried.
    ///
    /// Never fatal: sessions continue without a window size.
    #[error("terminal geometry unavailable")]
    GeometryUnavailable,

    /// The remote process could not be started or attached to.
    #[error("failed to start process: {0:#}")]
    ProcessStart(anyhow::Error),

    /// Waiting for the remote process failed.
    #[error("failed waiting for process: {0:#}")]
    ProcessWait(anyhow::Error),

    /// The archive stream is malformed, or the source could not be staged.
    #[error("archive format error: {0}")]
    ArchiveFormat(String),

    /// The stream ended before the declared entry length was reached.
    #[error("incomplete stream: expected {expected} bytes, got {actual}")]
    IncompleteStream {
        /// Declared body length.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new archive format error.
    #[must_use]
    pub fn archive_format(msg: impl Into<String>) -> Self {
        Self::ArchiveFormat(msg.into())
    }
}
