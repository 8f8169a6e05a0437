// src/error.rs

//! Error types shared by the message channel and the frame-boundary engine.

use std::io;
use thiserror::Error;

/// Failures of the controller connection or of message decoding.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by the controller")]
    Closed,

    #[error("string payload of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("unexpected message: expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
}

impl ChannelError {
    /// Maps a read/write error, turning a short read into `Closed`.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => ChannelError::Closed,
            _ => ChannelError::Io(err),
        }
    }
}

/// The only condition the frame-boundary engine surfaces to its caller.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("handshake for frame {frame} could not be sent: {source}")]
    HandshakeFailed {
        frame: u64,
        #[source]
        source: ChannelError,
    },
}
