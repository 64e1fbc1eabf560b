use std::collections::HashMap;

use tracing::{debug, trace};

use crate::card::{Card, CardId};
use crate::error::{GameError, Result};
use crate::event::GameEvent;
use crate::host::HostSettings;
use crate::player::{LifeState, Player, PlayerId};

/// Authoritative state of one game: who is seated, which cards exist and
/// which of them listen to every event.
#[derive(Debug, Default)]
pub struct GameSession {
    host_settings: HostSettings,
    players: Vec<Player>,
    cards: HashMap<CardId, Card>,
    intercept_any: Vec<CardId>,
}

impl GameSession {
    pub fn new(host_settings: HostSettings) -> Self {
        Self {
            host_settings,
            ..Self::default()
        }
    }

    pub fn host_settings(&self) -> HostSettings {
        self.host_settings
    }

    /// Seat a player. Ids must be unique within the session.
    pub fn add_player(&mut self, player: Player) -> Result<()> {
        if self.players.iter().any(|p| p.id == player.id) {
            return Err(GameError::DuplicatePlayer(player.id));
        }
        debug!(player = %player.id, name = %player.name, "player joined");
        self.players.push(player);
        Ok(())
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> Vec<&Player> {
        self.players_in(LifeState::Alive)
    }

    pub fn dead_players(&self) -> Vec<&Player> {
        self.players_in(LifeState::Dead)
    }

    pub fn other_players(&self) -> Vec<&Player> {
        self.players_in(LifeState::Other)
    }

    fn players_in(&self, state: LifeState) -> Vec<&Player> {
        self.players
            .iter()
            .filter(|p| p.life_state == state)
            .collect()
    }

    /// Register a card. Cards carrying `INTERCEPT_ANY` join the intercept
    /// list in registration order.
    pub fn register_card(&mut self, card: Card) -> Result<CardId> {
        let id = card.id();
        if self.cards.contains_key(&id) {
            return Err(GameError::DuplicateCard(id));
        }
        if card.intercepts_any() {
            self.intercept_any.push(id);
        }
        debug!(card = %id, kind = ?card.kind(), "card registered");
        self.cards.insert(id, card);
        Ok(id)
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    /// Cards that see every dispatched event, in dispatch order.
    pub fn intercept_any(&self) -> &[CardId] {
        &self.intercept_any
    }

    /// Move a card into a player's hand, taking it out of the previous
    /// holder's hand first.
    pub fn give_card(&mut self, card_id: CardId, player_id: PlayerId) -> Result<()> {
        if self.player(player_id).is_none() {
            return Err(GameError::UnknownPlayer(player_id));
        }
        let card = self
            .cards
            .get_mut(&card_id)
            .ok_or(GameError::UnknownCard(card_id))?;

        if let Some(previous) = card.holder() {
            if let Some(player) = self.players.iter_mut().find(|p| p.id == previous) {
                player.hand.retain(|held| *held != card_id);
            }
        }
        card.set_holder(Some(player_id));

        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            player.hand.push(card_id);
        }
        Ok(())
    }

    /// Take a card out of whatever hand holds it.
    pub fn discard_card(&mut self, card_id: CardId) -> Result<()> {
        let card = self
            .cards
            .get_mut(&card_id)
            .ok_or(GameError::UnknownCard(card_id))?;
        if let Some(previous) = card.holder() {
            if let Some(player) = self.players.iter_mut().find(|p| p.id == previous) {
                player.hand.retain(|held| *held != card_id);
            }
        }
        card.set_holder(None);
        Ok(())
    }

    /// Resolve a card's effect against the seated players.
    pub fn play_card(&mut self, card_id: CardId) -> Result<()> {
        let card = self
            .cards
            .get_mut(&card_id)
            .ok_or(GameError::UnknownCard(card_id))?;
        debug!(card = %card_id, holder = ?card.holder(), "playing card");
        card.play(&mut self.players)
    }

    /// Offer an event to every intercept-any card in registration order.
    ///
    /// Each interceptor sees the event as left by the ones before it.
    /// Returns how many cards were consulted.
    pub fn dispatch_event(&mut self, event: &mut GameEvent) -> usize {
        let mut consulted = 0;
        for id in &self.intercept_any {
            if let Some(card) = self.cards.get_mut(id) {
                card.intercept_event(event);
                consulted += 1;
                trace!(card = %id, proceeds = event.proceeds(), "event offered");
            }
        }
        consulted
    }
}
