//! In-process fragment delivery.
//!
//! A host that controls several perspectives in the same runtime (see
//! `HostSettings` in `apocalypse-game`) has no socket between them. The
//! memory pipe stands in for one, and doubles as a scriptable source in tests.

use std::io::Write;
use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::traits::FragmentSource;

/// Create a connected sender/source pair.
pub fn memory_pipe() -> (FragmentSender, MemoryFragmentSource) {
    let (tx, rx) = mpsc::channel();
    (
        FragmentSender { tx },
        MemoryFragmentSource {
            rx,
            fragments_received: 0,
        },
    )
}

/// Sending half of a [`memory_pipe`]. Cloneable.
///
/// Every `write` call becomes exactly one fragment on the receiving side.
#[derive(Debug, Clone)]
pub struct FragmentSender {
    tx: mpsc::Sender<Bytes>,
}

impl FragmentSender {
    /// Push one fragment. Fails with [`TransportError::Closed`] once the source is gone.
    pub fn send(&self, fragment: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(fragment.into())
            .map_err(|_| TransportError::Closed)
    }
}

impl Write for FragmentSender {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.send(Bytes::copy_from_slice(buf))
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Receiving half of a [`memory_pipe`].
#[derive(Debug)]
pub struct MemoryFragmentSource {
    rx: mpsc::Receiver<Bytes>,
    fragments_received: usize,
}

impl MemoryFragmentSource {
    /// Number of fragments handed out so far.
    pub fn fragments_received(&self) -> usize {
        self.fragments_received
    }
}

impl FragmentSource for MemoryFragmentSource {
    fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        if timeout.is_zero() {
            return Err(TransportError::TimedOut(timeout));
        }
        let fragment = self.rx.recv_timeout(timeout).map_err(|err| match err {
            mpsc::RecvTimeoutError::Timeout => TransportError::TimedOut(timeout),
            mpsc::RecvTimeoutError::Disconnected => TransportError::Closed,
        })?;
        self.fragments_received += 1;
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn fragments_arrive_in_send_order() {
        let (tx, mut rx) = memory_pipe();
        tx.send(&b"one"[..]).unwrap();
        tx.send(&b"two"[..]).unwrap();

        let timeout = Duration::from_millis(100);
        assert_eq!(rx.receive_fragment(timeout).unwrap().as_ref(), b"one");
        assert_eq!(rx.receive_fragment(timeout).unwrap().as_ref(), b"two");
        assert_eq!(rx.fragments_received(), 2);
    }

    #[test]
    fn empty_pipe_times_out() {
        let (_tx, mut rx) = memory_pipe();
        let start = Instant::now();
        let err = rx.receive_fragment(Duration::from_millis(50)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert_eq!(rx.fragments_received(), 0);
    }

    #[test]
    fn zero_timeout_does_not_consume_pending_data() {
        let (tx, mut rx) = memory_pipe();
        tx.send(&b"waiting"[..]).unwrap();

        assert!(rx.receive_fragment(Duration::ZERO).unwrap_err().is_timeout());
        assert_eq!(
            rx.receive_fragment(Duration::from_millis(50))
                .unwrap()
                .as_ref(),
            b"waiting"
        );
    }

    #[test]
    fn dropped_sender_closes_source() {
        let (tx, mut rx) = memory_pipe();
        drop(tx);
        let err = rx.receive_fragment(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn dropped_source_breaks_writer() {
        let (mut tx, rx) = memory_pipe();
        drop(rx);
        let err = tx.write(b"lost").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn each_write_is_one_fragment() {
        let (mut tx, mut rx) = memory_pipe();
        tx.write_all(b"abc").unwrap();
        tx.write_all(b"de").unwrap();

        let timeout = Duration::from_millis(50);
        assert_eq!(rx.receive_fragment(timeout).unwrap().as_ref(), b"abc");
        assert_eq!(rx.receive_fragment(timeout).unwrap().as_ref(), b"de");
    }
}
