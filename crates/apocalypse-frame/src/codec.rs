use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Length prefix: 4-byte unsigned big-endian payload length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default wait for a complete frame when the caller does not pass one.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// One application message. The payload has no structure at this layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Create a frame from any byte container.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The message payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Take the payload out of the frame.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The total wire size of this frame (prefix + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.payload.len()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Bytes> for Frame {
    fn from(payload: Bytes) -> Self {
        Self { payload }
    }
}

impl From<Vec<u8>> for Frame {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

/// Encode a payload into the wire format.
///
/// ```text
/// ┌──────────────────┬──────────────────┐
/// │ Length (4B BE)   │ Payload          │
/// │ unsigned         │ (Length bytes)   │
/// └──────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Which half of a frame the parser is currently assembling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    ReadingLength,
    ReadingBody,
}

/// Resumable frame reassembly.
///
/// Feed it fragments in arrival order, of any size, and it hands back every
/// frame those bytes complete. All partial state (a half-read length prefix,
/// a half-read body) lives inside the parser, so callers never buffer.
///
/// At most one frame is in flight at a time. A parser belongs to exactly one
/// connection and must not be fed from two places at once; `&mut self`
/// enforces that within safe code, and sharing across threads needs external
/// serialization.
#[derive(Debug)]
pub struct FrameParser {
    mode: ParserMode,
    length_buffer: [u8; LENGTH_PREFIX_SIZE],
    length_filled: usize,
    declared_length: usize,
    body_buffer: BytesMut,
    max_frame_size: Option<usize>,
    rejected_length: Option<u32>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// A parser with no ceiling on declared lengths.
    pub fn new() -> Self {
        Self::with_max_frame_size(None)
    }

    /// A parser that rejects frames declaring more than `max_frame_size` bytes.
    pub fn with_max_frame_size(max_frame_size: Option<usize>) -> Self {
        Self {
            mode: ParserMode::ReadingLength,
            length_buffer: [0; LENGTH_PREFIX_SIZE],
            length_filled: 0,
            declared_length: 0,
            body_buffer: BytesMut::new(),
            max_frame_size,
            rejected_length: None,
        }
    }

    /// Consume one fragment and return every frame it completes, in order.
    ///
    /// An empty fragment returns nothing and leaves state unchanged.
    ///
    /// If a length prefix exceeds the ceiling, the parser stops there and is
    /// poisoned. Frames already completed earlier in the same fragment are
    /// still returned; the error surfaces on that call when there are none,
    /// and on every later call.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Vec<Frame>> {
        self.ensure_healthy()?;

        let mut frames = Vec::new();
        let mut rest = fragment;

        loop {
            match self.mode {
                ParserMode::ReadingLength => {
                    let take = (LENGTH_PREFIX_SIZE - self.length_filled).min(rest.len());
                    self.length_buffer[self.length_filled..self.length_filled + take]
                        .copy_from_slice(&rest[..take]);
                    self.length_filled += take;
                    rest = &rest[take..];

                    if self.length_filled < LENGTH_PREFIX_SIZE {
                        break;
                    }

                    let declared = u32::from_be_bytes(self.length_buffer);
                    self.length_filled = 0;

                    if let Some(max) = self.max_frame_size {
                        if declared as usize > max {
                            self.rejected_length = Some(declared);
                            if frames.is_empty() {
                                return Err(FrameError::MalformedLength { declared, max });
                            }
                            return Ok(frames);
                        }
                    }

                    trace!(declared, "frame length decoded");
                    self.declared_length = declared as usize;
                    self.mode = ParserMode::ReadingBody;
                }
                ParserMode::ReadingBody => {
                    let take = (self.declared_length - self.body_buffer.len()).min(rest.len());
                    self.body_buffer.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];

                    if self.body_buffer.len() < self.declared_length {
                        break;
                    }

                    frames.push(Frame::new(self.body_buffer.split().freeze()));
                    self.declared_length = 0;
                    self.mode = ParserMode::ReadingLength;

                    if rest.is_empty() {
                        break;
                    }
                }
            }
        }

        if !frames.is_empty() {
            trace!(count = frames.len(), "frames assembled");
        }
        Ok(frames)
    }

    /// Fails with [`FrameError::MalformedLength`] once an oversized length has been seen.
    pub fn ensure_healthy(&self) -> Result<()> {
        match (self.rejected_length, self.max_frame_size) {
            (Some(declared), Some(max)) => Err(FrameError::MalformedLength { declared, max }),
            _ => Ok(()),
        }
    }

    /// Current assembly phase.
    pub fn mode(&self) -> ParserMode {
        self.mode
    }

    /// Length of the frame being assembled, once its prefix is complete.
    pub fn declared_length(&self) -> Option<usize> {
        match self.mode {
            ParserMode::ReadingBody => Some(self.declared_length),
            ParserMode::ReadingLength => None,
        }
    }

    /// Bytes held for the in-flight frame (prefix or body).
    pub fn buffered_len(&self) -> usize {
        match self.mode {
            ParserMode::ReadingLength => self.length_filled,
            ParserMode::ReadingBody => self.body_buffer.len(),
        }
    }

    /// True when no partial frame is held, i.e. the stream sits on a frame boundary.
    pub fn is_idle(&self) -> bool {
        self.mode == ParserMode::ReadingLength && self.length_filled == 0
    }

    /// Configured ceiling on declared lengths.
    pub fn max_frame_size(&self) -> Option<usize> {
        self.max_frame_size
    }
}

/// Configuration shared by channels and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Ceiling on declared frame lengths. Default: none.
    pub max_frame_size: Option<usize>,
    /// Wait used by receive calls that do not pass their own timeout. Default: 10s.
    pub receive_timeout: Duration,
    /// Write timeout for blocking streams. Default: none.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: None,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            write_timeout: None,
        }
    }
}
