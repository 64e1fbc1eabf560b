use std::fmt;
use std::io::Write;
use std::time::Duration;

use apocalypse_frame::{Frame, FrameConfig, FrameWriter, TimedChannel};
use apocalypse_transport::{
    memory_pipe, FragmentSender, FragmentSource, GameStream, MemoryFragmentSource,
    DEFAULT_CHUNK_SIZE,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;

/// Which side of the table a connection speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRole {
    /// The host's handle on a seated player.
    PlayerConnection,
    /// A read-only view of the game, e.g. a spectator or a local display.
    Perspective,
    /// The player's handle on the host.
    ControlledPlayer,
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionRole::PlayerConnection => "player-connection",
            ConnectionRole::Perspective => "perspective",
            ConnectionRole::ControlledPlayer => "controlled-player",
        })
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Framing and timeout settings. Default: [`FrameConfig::default`].
    pub frame: FrameConfig,
    /// Upper bound on bytes pulled from a socket per read. Default: 8 KiB.
    pub read_chunk_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A framed, bidirectional game connection.
///
/// Reads go through a [`TimedChannel`], so every receive is bounded by a
/// timeout and partial frames survive across calls. Writes go through a
/// [`FrameWriter`].
pub struct GameConnection<S, W> {
    id: String,
    role: ConnectionRole,
    channel: TimedChannel<S>,
    writer: FrameWriter<W>,
}

/// A connection over a Unix or TCP socket.
pub type StreamConnection = GameConnection<GameStream, GameStream>;

/// A connection over an in-process memory pipe.
pub type LocalConnection = GameConnection<MemoryFragmentSource, FragmentSender>;

impl<S: FragmentSource, W: Write> GameConnection<S, W> {
    /// Assemble a connection from an already split source and sink.
    pub fn from_parts(
        id: impl Into<String>,
        role: ConnectionRole,
        source: S,
        sink: W,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            channel: TimedChannel::with_config(source, config.frame.clone()),
            writer: FrameWriter::with_config(sink, config.frame.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Send one frame carrying `data`.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!(connection = %self.id, len = data.len(), "send");
        self.writer.send(data)?;
        Ok(())
    }

    /// Receive the next frame, waiting at most `timeout`.
    pub fn receive_raw(&mut self, timeout: Duration) -> Result<Frame> {
        let frame = self.channel.receive_frame(timeout)?;
        trace!(connection = %self.id, len = frame.len(), "receive");
        Ok(frame)
    }

    /// Receive the next frame using the configured receive timeout.
    pub fn receive(&mut self) -> Result<Frame> {
        let timeout = self.channel.config().receive_timeout;
        self.receive_raw(timeout)
    }

    /// Serialize `message` as JSON and send it as one frame.
    pub fn send_message<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.send_raw(&payload)
    }

    /// Receive one frame and decode it as JSON.
    pub fn receive_message<T: DeserializeOwned>(&mut self, timeout: Duration) -> Result<T> {
        let frame = self.receive_raw(timeout)?;
        Ok(serde_json::from_slice(frame.as_ref())?)
    }

    /// Frames already reassembled and waiting to be received.
    pub fn pending_frames(&self) -> usize {
        self.channel.pending_frames()
    }

    /// Total bytes read from the peer, including those of unfinished frames.
    pub fn bytes_received(&self) -> u64 {
        self.channel.bytes_received()
    }

    /// Whether part of a frame has arrived but not the rest of it.
    pub fn has_partial_frame(&self) -> bool {
        !self.channel.parser().is_idle()
    }

    /// Split back into the channel and writer halves.
    pub fn into_parts(self) -> (TimedChannel<S>, FrameWriter<W>) {
        (self.channel, self.writer)
    }
}

impl StreamConnection {
    /// Wrap a connected socket, cloning it into a read and a write half.
    pub fn from_stream(
        id: impl Into<String>,
        role: ConnectionRole,
        stream: GameStream,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let mut reader = stream.try_clone()?;
        reader.set_chunk_size(config.read_chunk_size);
        let writer = FrameWriter::for_stream(stream, config.frame.clone())?;

        Ok(Self {
            id: id.into(),
            role,
            channel: TimedChannel::with_config(reader, config.frame.clone()),
            writer,
        })
    }

    /// Label of the remote end, for logs.
    pub fn peer_label(&self) -> String {
        self.writer.get_ref().peer_label()
    }

    /// Shut the socket down in both directions.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}

/// Two connected in-process endpoints: the host's [`ConnectionRole::PlayerConnection`]
/// and the player's [`ConnectionRole::ControlledPlayer`].
pub fn local_pair(
    id: impl Into<String>,
    config: &ConnectionConfig,
) -> (LocalConnection, LocalConnection) {
    let id = id.into();
    let (to_player, player_source) = memory_pipe();
    let (to_host, host_source) = memory_pipe();

    let host = GameConnection::from_parts(
        id.clone(),
        ConnectionRole::PlayerConnection,
        host_source,
        to_player,
        config,
    );
    let player = GameConnection::from_parts(
        id,
        ConnectionRole::ControlledPlayer,
        player_source,
        to_host,
        config,
    );
    (host, player)
}

impl<S, W> fmt::Debug for GameConnection<S, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameConnection")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::error::GameError;
    use crate::event::{DisruptEvent, GameEvent};

    #[test]
    fn local_pair_roundtrip() {
        let (mut host, mut player) = local_pair("ash", &ConnectionConfig::default());
        assert_eq!(host.role(), ConnectionRole::PlayerConnection);
        assert_eq!(player.role(), ConnectionRole::ControlledPlayer);
        assert_eq!(host.id(), "ash");

        host.send_raw(b"your turn").unwrap();
        let frame = player.receive_raw(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"your turn");

        player.send_raw(b"").unwrap();
        let frame = host.receive().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn messages_are_json_frames() {
        let (mut host, mut player) = local_pair("birch", &ConnectionConfig::default());

        let event = GameEvent::from(DisruptEvent::new("draw"));
        host.send_message(&event).unwrap();
        let received: GameEvent = player.receive_message(Duration::from_secs(1)).unwrap();
        assert_eq!(received, event);

        player.send_message(&json!({"play": 4})).unwrap();
        let raw = host.receive_raw(Duration::from_secs(1)).unwrap();
        assert_eq!(raw.as_ref(), br#"{"play":4}"#);
    }

    #[test]
    fn invalid_json_is_reported() {
        let (mut host, mut player) = local_pair("cedar", &ConnectionConfig::default());
        host.send_raw(b"not json").unwrap();
        let err = player
            .receive_message::<GameEvent>(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, GameError::Json(_)));
    }

    #[test]
    fn receive_uses_configured_timeout() {
        let config = ConnectionConfig {
            frame: FrameConfig {
                receive_timeout: Duration::from_millis(100),
                ..FrameConfig::default()
            },
            ..ConnectionConfig::default()
        };
        let (_host, mut player) = local_pair("dawn", &config);

        let start = Instant::now();
        let err = player.receive().unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(90));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn partial_frame_counts_as_traffic() {
        let (tx, rx) = memory_pipe();
        let (sink, _unused) = memory_pipe();
        let mut conn = GameConnection::from_parts(
            "gale",
            ConnectionRole::PlayerConnection,
            rx,
            sink,
            &ConnectionConfig::default(),
        );

        tx.send(vec![0u8, 0, 0, 9, b'h']).unwrap();
        assert!(conn
            .receive_raw(Duration::from_millis(30))
            .unwrap_err()
            .is_timeout());
        assert_eq!(conn.bytes_received(), 5);
        assert!(conn.has_partial_frame());

        tx.send(&b"alf-done"[..]).unwrap();
        let frame = conn.receive_raw(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.as_ref(), b"half-done");
        assert_eq!(conn.bytes_received(), 13);
        assert!(!conn.has_partial_frame());
    }

    #[test]
    fn dropped_peer_is_disconnected() {
        let (host, mut player) = local_pair("elm", &ConnectionConfig::default());
        drop(host);
        let err = player.receive_raw(Duration::from_secs(1)).unwrap_err();
        assert!(err.is_disconnected());
    }

    #[test]
    fn oversized_send_is_refused() {
        let config = ConnectionConfig {
            frame: FrameConfig {
                max_frame_size: Some(4),
                ..FrameConfig::default()
            },
            ..ConnectionConfig::default()
        };
        let (mut host, _player) = local_pair("fir", &config);
        let err = host.send_raw(b"too long").unwrap_err();
        assert!(matches!(
            err,
            GameError::Frame(apocalypse_frame::FrameError::PayloadTooLarge { size: 8, max: 4 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn stream_connection_over_socket_pair() {
        let (left, right) = GameStream::pair().unwrap();
        let config = ConnectionConfig::default();
        let mut host =
            StreamConnection::from_stream("p1", ConnectionRole::PlayerConnection, left, &config)
                .unwrap();
        let mut player =
            StreamConnection::from_stream("host", ConnectionRole::ControlledPlayer, right, &config)
                .unwrap();

        assert_eq!(host.peer_label(), "unix");
        host.send_raw(b"one").unwrap();
        host.send_raw(b"two").unwrap();
        assert_eq!(player.receive().unwrap().as_ref(), b"one");
        assert_eq!(player.receive().unwrap().as_ref(), b"two");

        player.shutdown().unwrap();
        assert!(host
            .receive_raw(Duration::from_secs(1))
            .unwrap_err()
            .is_disconnected());
    }
}
