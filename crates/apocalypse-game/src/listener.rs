use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use apocalypse_transport::{GameStream, TcpGameListener};
#[cfg(unix)]
use apocalypse_transport::UnixDomainSocket;
use tracing::info;

use crate::connection::{ConnectionConfig, ConnectionRole, StreamConnection};
use crate::error::{GameError, Result};

const TCP_SCHEME: &str = "tcp://";

/// Where a game is hosted.
///
/// Parsed from either a filesystem path (Unix socket) or `tcp://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix(TCP_SCHEME) {
            if addr.is_empty() {
                return Err(GameError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        if s.is_empty() {
            return Err(GameError::InvalidEndpoint(s.to_string()));
        }
        Ok(Endpoint::Unix(PathBuf::from(s)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}

enum Acceptor {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpGameListener),
}

/// Host side of a game: accepts players and hands out framed connections.
pub struct GameListener {
    acceptor: Acceptor,
    config: ConnectionConfig,
    accepted: u64,
}

impl GameListener {
    /// Bind with default connection configuration.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, ConnectionConfig::default())
    }

    pub fn bind_with_config(endpoint: &Endpoint, config: ConnectionConfig) -> Result<Self> {
        let acceptor = match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Acceptor::Unix(UnixDomainSocket::bind(path)?),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(GameError::InvalidEndpoint(endpoint.to_string())),
            Endpoint::Tcp(addr) => Acceptor::Tcp(TcpGameListener::bind(addr.as_str())?),
        };
        Ok(Self {
            acceptor,
            config,
            accepted: 0,
        })
    }

    /// Accept the next player (blocking).
    ///
    /// Connections are numbered `player-1`, `player-2`, ... in accept order.
    pub fn accept(&mut self) -> Result<StreamConnection> {
        let stream = match &self.acceptor {
            #[cfg(unix)]
            Acceptor::Unix(socket) => socket.accept()?,
            Acceptor::Tcp(listener) => listener.accept()?,
        };
        self.accepted += 1;
        let id = format!("player-{}", self.accepted);
        info!(connection = %id, peer = %stream.peer_label(), "player connected");
        StreamConnection::from_stream(id, ConnectionRole::PlayerConnection, stream, &self.config)
    }

    /// The endpoint actually bound. For TCP this carries the resolved port.
    pub fn local_endpoint(&self) -> Endpoint {
        match &self.acceptor {
            #[cfg(unix)]
            Acceptor::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Acceptor::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl fmt::Debug for GameListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameListener")
            .field("endpoint", &self.local_endpoint())
            .field("accepted", &self.accepted)
            .finish()
    }
}

/// Connect to a hosted game as a [`ConnectionRole::ControlledPlayer`].
pub fn connect(endpoint: &Endpoint, config: &ConnectionConfig) -> Result<StreamConnection> {
    connect_as(endpoint, ConnectionRole::ControlledPlayer, config)
}

/// Connect to a hosted game with an explicit role, e.g. a perspective.
pub fn connect_as(
    endpoint: &Endpoint,
    role: ConnectionRole,
    config: &ConnectionConfig,
) -> Result<StreamConnection> {
    let stream: GameStream = match endpoint {
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path)?,
        #[cfg(not(unix))]
        Endpoint::Unix(_) => return Err(GameError::InvalidEndpoint(endpoint.to_string())),
        Endpoint::Tcp(addr) => TcpGameListener::connect(addr.as_str())?,
    };
    StreamConnection::from_stream("host", role, stream, config)
}
