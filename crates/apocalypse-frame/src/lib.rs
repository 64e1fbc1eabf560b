//! Length-prefixed message framing for Apocalypse game connections.
//!
//! Every message on the wire is a 4-byte big-endian unsigned length followed
//! by exactly that many payload bytes. No magic, no checksum, no version.
//!
//! Transports deliver bytes in arbitrary fragments. [`FrameParser`] stitches
//! them back into frames, and [`TimedChannel`] turns a fragment source into
//! "give me the next message, but don't wait longer than this".

pub mod channel;
pub mod codec;
pub mod error;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_channel;
#[cfg(feature = "async")]
pub mod framed;

pub use channel::TimedChannel;
pub use codec::{
    encode_frame, Frame, FrameConfig, FrameParser, ParserMode, DEFAULT_RECEIVE_TIMEOUT,
    LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_channel::AsyncTimedChannel;
#[cfg(feature = "async")]
pub use framed::FrameCodec;
