use std::time::Duration;

use apocalypse_transport::TransportError;

/// Errors that can occur while framing, sending or receiving messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No complete frame arrived before the receive deadline.
    ///
    /// Parser state is untouched; the caller may retry with a fresh timeout.
    #[error("no complete frame within {0:?}")]
    TimeoutExceeded(Duration),

    /// A length prefix declared more bytes than the configured ceiling.
    ///
    /// Fatal for the connection: the stream cannot be resynchronized.
    #[error("declared frame length {declared} exceeds limit of {max} bytes")]
    MalformedLength { declared: u32, max: usize },

    /// An outgoing payload is larger than the wire format or the configured ceiling allows.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The fragment source failed for a reason other than a timeout.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the receive deadline elapsed (retryable).
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::TimeoutExceeded(_))
    }

    /// Whether the remote end closed the stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, FrameError::Transport(TransportError::Closed))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
