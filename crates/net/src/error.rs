//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// Bad payload inside a well-delimited frame. Recoverable: the stream
    /// is still in sync and the connection stays open.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Framing violation (empty or oversized frame). The stream can no
    /// longer be trusted; the connection is dropped.
    #[error("Framing error: {0}")]
    Frame(String),

    #[error("Not connected")]
    NotConnected,
}
