use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::CardId;

/// Stable identifier of a seated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a player is still in the game.
///
/// `Other` covers states the base game does not model, such as a player
/// who left mid-round or a ghost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeState {
    #[default]
    Alive,
    Dead,
    Other,
}

/// A player seated in a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub health: i32,
    pub life_state: LifeState,
    /// Cards currently held, in the order they were received.
    #[serde(default)]
    pub hand: Vec<CardId>,
}

impl Player {
    /// A living player with an empty hand.
    pub fn new(id: PlayerId, name: impl Into<String>, health: i32) -> Self {
        Self {
            id,
            name: name.into(),
            health,
            life_state: LifeState::Alive,
            hand: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life_state == LifeState::Alive
    }

    pub fn holds(&self, card: CardId) -> bool {
        self.hand.contains(&card)
    }
}
