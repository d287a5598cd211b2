//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while decoding a chat stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A pending frame grew past the configured buffer limit.
    #[error("Frame buffer exceeded {limit} bytes without a separator")]
    BufferOverflow {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The underlying byte stream failed mid-read.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StreamError {
    /// Create a transport error from anything displayable.
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
