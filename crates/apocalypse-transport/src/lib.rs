//! Fragment sources for Apocalypse game connections.
//!
//! A transport's only job here is to hand out raw byte fragments with a
//! bounded wait. Fragments never respect message boundaries; reassembly is
//! the frame layer's business.
//!
//! Provided transports:
//! - Unix domain sockets (locally hosted games)
//! - TCP (remote players)
//! - In-process memory pipes (perspectives hosted in the same runtime)
//! - Any tokio `AsyncRead` (behind the `async` feature)

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(feature = "async")]
pub mod async_source;

pub use error::{Result, TransportError};
pub use memory::{memory_pipe, FragmentSender, MemoryFragmentSource};
pub use tcp::TcpGameListener;
pub use traits::{FragmentSource, GameStream, DEFAULT_CHUNK_SIZE};

#[cfg(unix)]
pub use uds::UnixDomainSocket;

#[cfg(feature = "async")]
pub use async_source::{AsyncFragmentSource, AsyncReadSource};
