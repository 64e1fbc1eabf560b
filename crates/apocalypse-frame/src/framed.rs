//! `tokio_util::codec` integration.
//!
//! [`FrameCodec`] lets the same wire format ride on `FramedRead` /
//! `FramedWrite` for callers who prefer `Stream`/`Sink` over explicit
//! deadlines. Decoding is delegated to [`FrameParser`], so both paths share
//! one reassembly implementation.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameParser};
use crate::error::{FrameError, Result};

/// Length-prefixed codec for `Framed*` adapters.
#[derive(Debug, Default)]
pub struct FrameCodec {
    parser: FrameParser,
    ready: VecDeque<Frame>,
    max_frame_size: Option<usize>,
}

impl FrameCodec {
    /// A codec with no size ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec that rejects frames larger than `max_frame_size` in both directions.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            parser: FrameParser::with_max_frame_size(Some(max_frame_size)),
            ready: VecDeque::new(),
            max_frame_size: Some(max_frame_size),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.ready.pop_front() {
            return Ok(Some(frame));
        }
        // A poisoned parser fails every call, even with nothing new to read.
        self.parser.ensure_healthy()?;
        if src.is_empty() {
            return Ok(None);
        }

        let fragment = src.split();
        self.ready.extend(self.parser.feed(&fragment)?);
        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.parser.is_idle() => Ok(None),
            None => Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended in the middle of a frame",
            ))),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if let Some(max) = self.max_frame_size {
            if payload.len() > max {
                return Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max,
                });
            }
        }
        encode_frame(&payload, dst)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        Encoder::<Bytes>::encode(self, frame.into_payload(), dst)
    }
}
