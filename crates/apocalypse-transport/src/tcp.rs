use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::GameStream;

/// TCP listener for games with remote players.
pub struct TcpGameListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpGameListener {
    /// Bind to `addr`. Use port 0 to let the OS pick one.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let endpoint = format!("{addr:?}");
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            endpoint: endpoint.clone(),
            source,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { endpoint, source })?;

        info!(%local_addr, "game host listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next incoming connection (blocking).
    pub fn accept(&self) -> Result<GameStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        configure(&stream)?;
        debug!(%peer, "accepted game connection");
        Ok(GameStream::from_tcp(stream))
    }

    /// Connect to a game host over TCP (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<GameStream> {
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            endpoint: format!("{addr:?}"),
            source,
        })?;
        configure(&stream)?;
        debug!(?addr, "connected to game host");
        Ok(GameStream::from_tcp(stream))
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

// Game messages are small and latency-sensitive.
fn configure(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::traits::FragmentSource;

    #[test]
    fn tcp_roundtrip_on_ephemeral_port() {
        let listener = TcpGameListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let client = std::thread::spawn(move || {
            let mut stream = TcpGameListener::connect(addr).unwrap();
            stream.write_all(b"ante").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let fragment = server.receive_fragment(Duration::from_secs(2)).unwrap();
        assert_eq!(fragment.as_ref(), b"ante");
        assert!(server.peer_label().starts_with("127.0.0.1:"));
        client.join().unwrap();
    }

    #[test]
    fn connect_refused_is_connect_error() {
        // Grab a free port, then release it so nothing is listening.
        let addr = TcpGameListener::bind("127.0.0.1:0").unwrap().local_addr();
        let err = TcpGameListener::connect(addr).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
