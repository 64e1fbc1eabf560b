use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while moving raw bytes between game participants.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind a listener to the given endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the given endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// No fragment arrived within the requested duration.
    #[error("no data received within {0:?}")]
    TimedOut(Duration),

    /// The remote side closed the stream.
    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    /// Whether this error means "nothing arrived in time" rather than a broken transport.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::TimedOut(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
