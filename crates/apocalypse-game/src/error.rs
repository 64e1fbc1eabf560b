use crate::card::CardId;
use crate::player::PlayerId;

/// Errors that can occur in game sessions and game connections.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] apocalypse_transport::TransportError),

    /// Frame-level error (timeouts, corrupt lengths, broken streams).
    #[error("frame error: {0}")]
    Frame(#[from] apocalypse_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No player with this id is seated in the session.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// No card with this id is registered in the session.
    #[error("unknown card {0}")]
    UnknownCard(CardId),

    /// A player with this id is already seated.
    #[error("player {0} already joined")]
    DuplicatePlayer(PlayerId),

    /// A card with this id is already registered.
    #[error("card {0} already registered")]
    DuplicateCard(CardId),

    /// A card effect refused to resolve.
    #[error("card {card} failed to resolve: {reason}")]
    Effect { card: CardId, reason: String },

    /// The endpoint string could not be understood.
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),
}

impl GameError {
    /// Whether a receive gave up because its deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GameError::Frame(err) if err.is_timeout())
    }

    /// Whether the other side hung up.
    pub fn is_disconnected(&self) -> bool {
        match self {
            GameError::Frame(err) => err.is_closed(),
            GameError::Transport(err) => {
                matches!(err, apocalypse_transport::TransportError::Closed)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
