use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Default number of bytes requested from the OS per fragment read.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Something that hands out raw byte fragments with a bounded wait.
///
/// Fragments carry no framing guarantees: a single fragment may hold part of
/// a message, several messages, or anything in between.
///
/// Implementations must:
/// - fail with [`TransportError::TimedOut`] if nothing arrives within `timeout`,
///   and fail immediately (without blocking) when `timeout` is zero;
/// - report a cleanly closed stream as [`TransportError::Closed`].
pub trait FragmentSource {
    /// Wait at most `timeout` for the next fragment.
    fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes>;
}

impl<S: FragmentSource + ?Sized> FragmentSource for &mut S {
    fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive_fragment(timeout)
    }
}

impl<S: FragmentSource + ?Sized> FragmentSource for Box<S> {
    fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive_fragment(timeout)
    }
}

/// A connected game stream: implements `Read`, `Write` and [`FragmentSource`].
///
/// Wraps either a Unix domain socket (local hosts) or a TCP stream
/// (networked players).
pub struct GameStream {
    inner: GameStreamInner,
    chunk_size: usize,
}

enum GameStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(std::net::TcpStream),
}

impl Read for GameStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream.read(buf),
            GameStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for GameStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream.write(buf),
            GameStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream.flush(),
            GameStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl GameStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: GameStreamInner::Unix(stream),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub(crate) fn from_tcp(stream: std::net::TcpStream) -> Self {
        Self {
            inner: GameStreamInner::Tcp(stream),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a connected pair of local streams (useful for in-process hosts and tests).
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Maximum number of bytes returned by a single [`FragmentSource::receive_fragment`] call.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Override the per-fragment read size. Zero is clamped to one byte.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            GameStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            GameStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The usual split is one clone for the reading side and one for writing.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => GameStreamInner::Unix(stream.try_clone()?),
            GameStreamInner::Tcp(stream) => GameStreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            chunk_size: self.chunk_size,
        })
    }

    /// Shut down both directions of the stream.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
            GameStreamInner::Tcp(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
        }
    }

    /// Human-readable description of the remote end, for logs and CLI output.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(_) => "unix".to_string(),
            GameStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp".to_string()),
        }
    }
}

impl FragmentSource for GameStream {
    fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        if timeout.is_zero() {
            return Err(TransportError::TimedOut(timeout));
        }

        let deadline = Instant::now().checked_add(timeout);
        let mut chunk = BytesMut::zeroed(self.chunk_size);

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return Err(TransportError::TimedOut(timeout));
            }
            self.set_read_timeout(Some(remaining))?;

            match self.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(chunk.freeze());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::TimedOut(timeout));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl std::fmt::Debug for GameStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            #[cfg(unix)]
            GameStreamInner::Unix(_) => "unix",
            GameStreamInner::Tcp(_) => "tcp",
        };
        f.debug_struct("GameStream")
            .field("type", &kind)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn fragment_is_whatever_the_peer_wrote() {
        let (mut left, mut right) = GameStream::pair().unwrap();
        left.write_all(b"partial").unwrap();

        let fragment = right.receive_fragment(Duration::from_secs(1)).unwrap();
        assert_eq!(fragment.as_ref(), b"partial");
    }

    #[test]
    fn chunk_size_caps_fragment_length() {
        let (mut left, mut right) = GameStream::pair().unwrap();
        right.set_chunk_size(3);
        left.write_all(b"abcdefg").unwrap();

        let first = right.receive_fragment(Duration::from_secs(1)).unwrap();
        let second = right.receive_fragment(Duration::from_secs(1)).unwrap();
        assert_eq!(first.as_ref(), b"abc");
        assert_eq!(second.as_ref(), b"def");
    }

    #[test]
    fn zero_timeout_fails_without_blocking() {
        let (_left, mut right) = GameStream::pair().unwrap();
        let start = Instant::now();
        let err = right.receive_fragment(Duration::ZERO).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn silent_peer_times_out_near_deadline() {
        let (_left, mut right) = GameStream::pair().unwrap();
        let start = Instant::now();
        let err = right
            .receive_fragment(Duration::from_millis(150))
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, TransportError::TimedOut(d) if d == Duration::from_millis(150)));
        assert!(elapsed >= Duration::from_millis(140), "returned too early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "returned too late: {elapsed:?}");
    }

    #[test]
    fn closed_peer_reports_closed() {
        let (left, mut right) = GameStream::pair().unwrap();
        drop(left);
        let err = right.receive_fragment(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn chunk_size_zero_is_clamped() {
        let (_left, mut right) = GameStream::pair().unwrap();
        right.set_chunk_size(0);
        assert_eq!(right.chunk_size(), 1);
    }

    #[test]
    fn cloned_stream_shares_the_connection() {
        let (left, mut right) = GameStream::pair().unwrap();
        let mut writer = left.try_clone().unwrap();
        writer.write_all(b"via-clone").unwrap();

        let fragment = right.receive_fragment(Duration::from_secs(1)).unwrap();
        assert_eq!(fragment.as_ref(), b"via-clone");
        assert_eq!(left.peer_label(), "unix");
    }
}
