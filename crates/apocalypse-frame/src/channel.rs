use std::collections::VecDeque;
use std::time::{Duration, Instant};

use apocalypse_transport::{FragmentSource, TransportError};
use tracing::trace;

use crate::codec::{Frame, FrameConfig, FrameParser};
use crate::error::{FrameError, Result};

/// Absolute point in time a receive call must finish by.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget,
        }
    }

    /// Time left, never negative. A budget too large to represent as an
    /// `Instant` never shrinks.
    pub(crate) fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => self.budget,
        }
    }

    pub(crate) fn budget(&self) -> Duration {
        self.budget
    }

    /// Translate a source failure: its timeouts become ours, anything else is fatal.
    pub(crate) fn source_error(&self, err: TransportError) -> FrameError {
        if err.is_timeout() {
            FrameError::TimeoutExceeded(self.budget)
        } else {
            FrameError::Transport(err)
        }
    }
}

/// Parser plus the frames it produced that nobody has asked for yet.
#[derive(Debug)]
pub(crate) struct FrameQueue {
    parser: FrameParser,
    ready: VecDeque<Frame>,
    received: u64,
}

impl FrameQueue {
    pub(crate) fn new(max_frame_size: Option<usize>) -> Self {
        Self {
            parser: FrameParser::with_max_frame_size(max_frame_size),
            ready: VecDeque::new(),
            received: 0,
        }
    }

    /// Next buffered frame, or an error if the stream is already corrupt.
    pub(crate) fn next_ready(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }
        self.parser.ensure_healthy()?;
        Ok(None)
    }

    pub(crate) fn absorb(&mut self, fragment: &[u8]) -> Result<()> {
        self.received = self.received.saturating_add(fragment.len() as u64);
        let frames = self.parser.feed(fragment)?;
        trace!(
            fragment_len = fragment.len(),
            frames = frames.len(),
            "fragment absorbed"
        );
        self.ready.extend(frames);
        Ok(())
    }

    pub(crate) fn pending(&self) -> usize {
        self.ready.len()
    }

    pub(crate) fn parser(&self) -> &FrameParser {
        &self.parser
    }

    pub(crate) fn received(&self) -> u64 {
        self.received
    }
}

/// Pulls whole frames out of a [`FragmentSource`], waiting at most a given duration.
///
/// Frames come back in the order their bytes arrived. When one fragment
/// completes several frames, the extras are held and handed out by later
/// calls before the source is asked for anything new.
///
/// One reader per channel: every receive takes `&mut self`.
#[derive(Debug)]
pub struct TimedChannel<S> {
    source: S,
    queue: FrameQueue,
    config: FrameConfig,
}

impl<S: FragmentSource> TimedChannel<S> {
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
    ///
    /// On [`FrameError::TimeoutExceeded`] nothing is lost: bytes already
    /// received stay in the parser and a later call picks up where this one
    /// stopped. Any other error ends the connection.
    pub fn receive_frame(&mut self, timeout: Duration) -> Result<Frame> {
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
                .map_err(|err| deadline.source_error(err))?;
            self.queue.absorb(&fragment)?;
        }
    }

    /// Receive one frame using the configured default timeout.
    pub fn receive(&mut self) -> Result<Frame> {
        self.receive_frame(self.config.receive_timeout)
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

    /// Mutably borrow the fragment source.
    ///
    /// Reading from it directly bypasses the parser and desynchronizes the stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the channel and return the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use apocalypse_transport::{memory_pipe, FragmentSender};
    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::codec::encode_frame;

    fn wire(payloads: &[&[u8]]) -> Bytes {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).unwrap();
        }
        buf.freeze()
    }

    /// Scripted source that records every timeout it was given.
    struct ScriptedSource {
        script: VecDeque<std::result::Result<Bytes, TransportError>>,
        timeouts: Vec<Duration>,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::result::Result<Bytes, TransportError>>) -> Self {
            Self {
                script: script.into(),
                timeouts: Vec::new(),
            }
        }
    }

    impl FragmentSource for ScriptedSource {
        fn receive_fragment(
            &mut self,
            timeout: Duration,
        ) -> apocalypse_transport::Result<Bytes> {
            self.timeouts.push(timeout);
            self.script
                .pop_front()
                .unwrap_or(Err(TransportError::TimedOut(timeout)))
        }
    }

    /// Source that never delivers, but honours its timeout like a real socket.
    struct SilentSource {
        calls: Rc<Cell<usize>>,
    }

    impl FragmentSource for SilentSource {
        fn receive_fragment(
            &mut self,
            timeout: Duration,
        ) -> apocalypse_transport::Result<Bytes> {
            self.calls.set(self.calls.get() + 1);
            std::thread::sleep(timeout);
            Err(TransportError::TimedOut(timeout))
        }
    }

    #[test]
    fn returns_frame_from_single_fragment() {
        let source = ScriptedSource::new(vec![Ok(wire(&[b"deal"]))]);
        let mut channel = TimedChannel::new(source);

        let frame = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"deal");
    }

    #[test]
    fn keeps_asking_until_a_frame_completes() {
        let bytes = wire(&[b"hello"]);
        let source = ScriptedSource::new(vec![
            Ok(bytes.slice(0..1)),
            Ok(bytes.slice(1..3)),
            Ok(bytes.slice(3..6)),
            Ok(bytes.slice(6..)),
        ]);
        let mut channel = TimedChannel::new(source);

        let frame = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"hello");
        assert_eq!(channel.get_ref().timeouts.len(), 4);
    }

    #[test]
    fn extra_frame_is_served_without_touching_source() {
        let (tx, rx) = memory_pipe();
        tx.send(wire(&[b"frame-1", b"frame-2"])).unwrap();
        let mut channel = TimedChannel::new(rx);

        let first = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(first.as_ref(), b"frame-1");
        assert_eq!(channel.pending_frames(), 1);
        assert_eq!(channel.get_ref().fragments_received(), 1);

        let second = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(second.as_ref(), b"frame-2");
        assert_eq!(channel.get_ref().fragments_received(), 1);
    }

    #[test]
    fn buffered_frame_wins_even_with_zero_timeout() {
        let source = ScriptedSource::new(vec![Ok(wire(&[b"a", b"b"]))]);
        let mut channel = TimedChannel::new(source);

        channel.receive_frame(Duration::from_secs(1)).unwrap();
        let second = channel.receive_frame(Duration::ZERO).unwrap();
        assert_eq!(second.as_ref(), b"b");
        assert_eq!(channel.get_ref().timeouts.len(), 1);
    }

    #[test]
    fn zero_timeout_fails_without_calling_source() {
        let source = ScriptedSource::new(vec![Ok(wire(&[b"never read"]))]);
        let mut channel = TimedChannel::new(source);

        let err = channel.receive_frame(Duration::ZERO).unwrap_err();
        assert!(matches!(err, FrameError::TimeoutExceeded(d) if d.is_zero()));
        assert!(channel.get_ref().timeouts.is_empty());
    }

    #[test]
    fn source_sees_shrinking_remaining_time() {
        let bytes = wire(&[b"slow"]);
        let source = ScriptedSource::new(vec![Ok(bytes.slice(0..2)), Ok(bytes.slice(2..))]);
        let mut channel = TimedChannel::new(source);

        let budget = Duration::from_secs(5);
        channel.receive_frame(budget).unwrap();

        let timeouts = &channel.get_ref().timeouts;
        assert_eq!(timeouts.len(), 2);
        assert!(timeouts[0] <= budget);
        assert!(timeouts[1] <= timeouts[0]);
    }

    #[test]
    fn never_delivering_source_times_out_near_budget() {
        let calls = Rc::new(Cell::new(0));
        let mut channel = TimedChannel::new(SilentSource {
            calls: Rc::clone(&calls),
        });

        let start = Instant::now();
        let err = channel.receive_frame(Duration::from_secs(1)).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, FrameError::TimeoutExceeded(d) if d == Duration::from_secs(1)));
        assert!(elapsed >= Duration::from_millis(950), "too early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "too late: {elapsed:?}");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn timeout_keeps_partial_frame_for_retry() {
        let bytes = wire(&[b"resume"]);
        let (tx, rx): (FragmentSender, _) = memory_pipe();
        let mut channel = TimedChannel::new(rx);

        tx.send(bytes.slice(0..5)).unwrap();
        let err = channel
            .receive_frame(Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(channel.parser().buffered_len(), 1);
        assert_eq!(channel.bytes_received(), 5);

        tx.send(bytes.slice(5..)).unwrap();
        let frame = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"resume");
        assert_eq!(channel.bytes_received(), 10);
    }

    #[test]
    fn transport_failure_propagates() {
        let source = ScriptedSource::new(vec![Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )))]);
        let mut channel = TimedChannel::new(source);

        let err = channel.receive_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Io(ref io))
                if io.kind() == std::io::ErrorKind::ConnectionReset
        ));
    }

    #[test]
    fn closed_source_is_reported() {
        let (tx, rx) = memory_pipe();
        drop(tx);
        let mut channel = TimedChannel::new(rx);

        let err = channel.receive_frame(Duration::from_secs(1)).unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn ceiling_from_config_is_enforced() {
        let source = ScriptedSource::new(vec![Ok(wire(&[b"way too long"]))]);
        let config = FrameConfig {
            max_frame_size: Some(4),
            ..FrameConfig::default()
        };
        let mut channel = TimedChannel::with_config(source, config);

        let err = channel.receive_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::MalformedLength { max: 4, .. }));
    }

    #[test]
    fn corrupt_stream_fails_after_buffered_frames_drain() {
        let mut bytes = BytesMut::from(wire(&[b"ok"]).as_ref());
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        let source = ScriptedSource::new(vec![Ok(bytes.freeze())]);
        let config = FrameConfig {
            max_frame_size: Some(16),
            ..FrameConfig::default()
        };
        let mut channel = TimedChannel::with_config(source, config);

        let frame = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"ok");

        let err = channel.receive_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::MalformedLength { .. }));
        assert_eq!(channel.get_ref().timeouts.len(), 1);
    }

    #[test]
    fn receive_uses_configured_timeout() {
        let source = ScriptedSource::new(vec![]);
        let config = FrameConfig {
            receive_timeout: Duration::from_millis(250),
            ..FrameConfig::default()
        };
        let mut channel = TimedChannel::with_config(source, config);

        let err = channel.receive().unwrap_err();
        assert!(matches!(err, FrameError::TimeoutExceeded(d) if d == Duration::from_millis(250)));
        assert!(channel.get_ref().timeouts[0] <= Duration::from_millis(250));
    }

    #[test]
    fn oversized_budget_does_not_overflow() {
        let source = ScriptedSource::new(vec![Ok(wire(&[b"x"]))]);
        let mut channel = TimedChannel::new(source);
        let frame = channel.receive_frame(Duration::MAX).unwrap();
        assert_eq!(frame.as_ref(), b"x");
    }

    #[test]
    fn empty_fragments_are_tolerated() {
        let source = ScriptedSource::new(vec![Ok(Bytes::new()), Ok(wire(&[b"after"]))]);
        let mut channel = TimedChannel::new(source);
        let frame = channel.receive_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"after");
        assert_eq!(channel.get_ref().timeouts.len(), 2);
    }
}
