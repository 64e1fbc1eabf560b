//! Game model and framed player connections for Apocalypse.
//!
//! [`GameSession`] holds the authoritative state of a game: seated players,
//! registered cards and the cards that intercept every event. Players talk
//! to the host through [`GameConnection`]s, which carry one message per
//! length-prefixed frame.

pub mod card;
pub mod connection;
pub mod error;
pub mod event;
pub mod host;
pub mod listener;
pub mod player;
pub mod session;

pub use card::{Card, CardEffect, CardId, CardKind, CardPermissions, ChaosEffect, PlayContext};
pub use connection::{
    local_pair, ConnectionConfig, ConnectionRole, GameConnection, LocalConnection,
    StreamConnection,
};
pub use error::{GameError, Result};
pub use event::{BooleanEvent, DisruptEvent, Event, GameEvent, InterceptionEvent};
pub use host::HostSettings;
pub use listener::{connect, connect_as, Endpoint, GameListener};
pub use player::{LifeState, Player, PlayerId};
pub use session::GameSession;
