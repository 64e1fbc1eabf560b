use std::time::Duration;

use apocalypse_transport::AsyncFragmentSource;

use crate::channel::{Deadline, FrameQueue};
use crate::codec::{Frame, FrameConfig, FrameParser};
use crate::error::{FrameError, Result};

/// Async rendition of [`TimedChannel`](crate::TimedChannel).
///
/// The only suspension point is the wait on the fragment source. Dropping a
/// pending `receive_frame` future is equivalent to a timeout: whatever was
/// already fed stays fed.
#[derive(Debug)]
pub struct AsyncTimedChannel<S> {
    source: S,
    queue: FrameQueue,
    config: FrameConfig,
}

impl<S: AsyncFragmentSource> AsyncTimedChannel<S> {
    /// Create a channel with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, FrameConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(source: S, config: FrameConfig) -> Self {
        Self {
            source,
            queue: FrameQueue::new(config.max_frame_size),
            config,
        }
    }

    /// Receive one complete frame, waiting at most `timeout`.
    pub async fn receive_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let deadline = Deadline::after(timeout);

        loop {
            if let Some(frame) = self.queue.next_ready()? {
                return Ok(frame);
            }

            let remaining = deadline.remaining();
            if remaining.is_zero() {
                return Err(FrameError::TimeoutExceeded(deadline.budget()));
            }

            let fragment = self
                .source
                .receive_fragment(remaining)
                .await
                .map_err(|err| deadline.source_error(err))?;
            self.queue.absorb(&fragment)?;
        }
    }

    /// Receive one frame using the configured default timeout.
    pub async fn receive(&mut self) -> Result<Frame> {
        let timeout = self.config.receive_timeout;
        self.receive_frame(timeout).await
    }

    /// Frames already parsed and waiting to be returned.
    pub fn pending_frames(&self) -> usize {
        self.queue.pending()
    }

    /// Inspect the parser state.
    pub fn parser(&self) -> &FrameParser {
        self.queue.parser()
    }

    /// Total bytes taken from the source, including those of unfinished frames.
    pub fn bytes_received(&self) -> u64 {
        self.queue.received()
    }

    /// Current channel configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Borrow the fragment source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Consume the channel and return the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use apocalypse_transport::AsyncReadSource;
    use bytes::{Bytes, BytesMut};
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(payloads: &[&[u8]]) -> Bytes {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).unwrap();
        }
        buf.freeze()
    }

    #[tokio::test]
    async fn assembles_frame_from_trickled_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut channel = AsyncTimedChannel::new(AsyncReadSource::new(server));

        let bytes = wire(&[b"hello"]);
        let writer = tokio::spawn(async move {
            for byte in bytes.iter() {
                client.write_all(&[*byte]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            client
        });

        let frame = channel.receive_frame(Duration::from_secs(2)).await.unwrap();
        assert_eq!(frame.as_ref(), b"hello");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn second_frame_comes_from_buffer() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(wire(&[b"one", b"two"])).await.unwrap();
        let mut channel = AsyncTimedChannel::new(rx);

        let first = channel.receive_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(channel.pending_frames(), 1);
        // Drop the sender: a source call now would report Closed.
        drop(tx);
        let second = channel.receive_frame(Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.as_ref(), b"one");
        assert_eq!(second.as_ref(), b"two");
    }

    #[tokio::test]
    async fn silent_source_times_out_near_budget() {
        let (_tx, rx) = mpsc::channel::<Bytes>(1);
        let mut channel = AsyncTimedChannel::new(rx);

        let start = Instant::now();
        let err = channel
            .receive_frame(Duration::from_millis(200))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(190), "too early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "too late: {elapsed:?}");
    }

    #[tokio::test]
    async fn partial_frame_survives_timeout() {
        let (tx, rx) = mpsc::channel(4);
        let bytes = wire(&[b"later"]);
        let mut channel = AsyncTimedChannel::new(rx);

        tx.send(bytes.slice(..6)).await.unwrap();
        assert!(channel
            .receive_frame(Duration::from_millis(30))
            .await
            .unwrap_err()
            .is_timeout());

        assert_eq!(channel.bytes_received(), 6);

        tx.send(bytes.slice(6..)).await.unwrap();
        let frame = channel.receive_frame(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.as_ref(), b"later");
    }

    #[tokio::test]
    async fn closed_stream_is_reported() {
        let (client, server) = tokio::io::duplex(16);
        drop(client);
        let mut channel = AsyncTimedChannel::new(AsyncReadSource::new(server));
        let err = channel.receive().await.unwrap_err();
        assert!(err.is_closed());
    }
}
