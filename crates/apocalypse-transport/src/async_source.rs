use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::DEFAULT_CHUNK_SIZE;

/// Async counterpart of [`FragmentSource`](crate::FragmentSource).
///
/// Same contract: time out after `timeout`, fail immediately on a zero
/// timeout, report end of stream as [`TransportError::Closed`]. A call that
/// is cancelled (dropped) must not lose bytes already read from the OS.
#[allow(async_fn_in_trait)]
pub trait AsyncFragmentSource {
    /// Wait at most `timeout` for the next fragment.
    async fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes>;
}

impl<S: AsyncFragmentSource + ?Sized> AsyncFragmentSource for &mut S {
    async fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive_fragment(timeout).await
    }
}

/// Adapts any tokio `AsyncRead` (TCP, UDS, duplex pipe) into a fragment source.
#[derive(Debug)]
pub struct AsyncReadSource<R> {
    inner: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> AsyncReadSource<R> {
    /// Wrap a reader using the default chunk size.
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap a reader, reading at most `chunk_size` bytes per fragment.
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the adapter and return the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncFragmentSource for AsyncReadSource<R> {
    async fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        if timeout.is_zero() {
            return Err(TransportError::TimedOut(timeout));
        }

        // `read_buf` is cancel safe, so an elapsed timeout never drops bytes.
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let read = tokio::time::timeout(timeout, self.inner.read_buf(&mut buf))
            .await
            .map_err(|_| TransportError::TimedOut(timeout))??;

        if read == 0 {
            return Err(TransportError::Closed);
        }
        Ok(buf.freeze())
    }
}

impl AsyncFragmentSource for mpsc::Receiver<Bytes> {
    async fn receive_fragment(&mut self, timeout: Duration) -> Result<Bytes> {
        if timeout.is_zero() {
            return Err(TransportError::TimedOut(timeout));
        }
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(Some(fragment)) => Ok(fragment),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::TimedOut(timeout)),
        }
    }
}
