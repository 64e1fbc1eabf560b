use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::event::GameEvent;
use crate::player::{Player, PlayerId};

/// Stable identifier of a registered card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Resolves on its own when drawn.
    Chaos,
    /// Held in hand and played by its holder.
    Action,
    /// Played by a dead player.
    GhostAction,
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct CardPermissions: u8 {
        /// Sees every event dispatched through the session.
        const INTERCEPT_ANY = 0b1;
    }
}

/// What a card's effect may touch while it resolves.
pub struct PlayContext<'a> {
    card: CardId,
    holder: Option<PlayerId>,
    players: &'a mut [Player],
}

impl<'a> PlayContext<'a> {
    pub(crate) fn new(card: CardId, holder: Option<PlayerId>, players: &'a mut [Player]) -> Self {
        Self {
            card,
            holder,
            players,
        }
    }

    pub fn card(&self) -> CardId {
        self.card
    }

    pub fn holder(&self) -> Option<PlayerId> {
        self.holder
    }

    pub fn players(&self) -> &[Player] {
        &*self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut *self.players
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.id == id)
            .ok_or(GameError::UnknownPlayer(id))
    }

    /// Fail the play with a reason attached to this card.
    pub fn refuse(&self, reason: impl Into<String>) -> GameError {
        GameError::Effect {
            card: self.card,
            reason: reason.into(),
        }
    }
}

/// Behaviour attached to a card.
pub trait CardEffect: Send {
    fn play(&mut self, ctx: &mut PlayContext<'_>) -> Result<()>;

    /// Inspect or rewrite an event. Only called for cards with
    /// [`CardPermissions::INTERCEPT_ANY`].
    fn intercept_event(&mut self, _card: CardId, _event: &mut GameEvent) {}
}

impl<F> CardEffect for F
where
    F: FnMut(&mut PlayContext<'_>) -> Result<()> + Send,
{
    fn play(&mut self, ctx: &mut PlayContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Behaviour of a chaos card. Playing one makes it occur.
pub trait ChaosEffect: Send {
    fn occur(&mut self, ctx: &mut PlayContext<'_>) -> Result<()>;

    fn intercept_event(&mut self, _card: CardId, _event: &mut GameEvent) {}
}

impl<F> ChaosEffect for F
where
    F: FnMut(&mut PlayContext<'_>) -> Result<()> + Send,
{
    fn occur(&mut self, ctx: &mut PlayContext<'_>) -> Result<()> {
        self(ctx)
    }
}

struct Occur<E>(E);

impl<E: ChaosEffect> CardEffect for Occur<E> {
    fn play(&mut self, ctx: &mut PlayContext<'_>) -> Result<()> {
        self.0.occur(ctx)
    }

    fn intercept_event(&mut self, card: CardId, event: &mut GameEvent) {
        self.0.intercept_event(card, event)
    }
}

/// A card instance.
///
/// Every card can be held, including chaos cards. `newest_holder` remembers
/// the last player that held the card after it leaves a hand.
pub struct Card {
    id: CardId,
    kind: CardKind,
    permissions: CardPermissions,
    holder: Option<PlayerId>,
    newest_holder: Option<PlayerId>,
    effect: Box<dyn CardEffect>,
}

impl Card {
    pub fn new(id: CardId, kind: CardKind, effect: impl CardEffect + 'static) -> Self {
        Self {
            id,
            kind,
            permissions: CardPermissions::empty(),
            holder: None,
            newest_holder: None,
            effect: Box::new(effect),
        }
    }

    pub fn chaos(id: CardId, effect: impl ChaosEffect + 'static) -> Self {
        Self::new(id, CardKind::Chaos, Occur(effect))
    }

    pub fn with_permissions(mut self, permissions: CardPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn kind(&self) -> CardKind {
        self.kind
    }

    pub fn permissions(&self) -> CardPermissions {
        self.permissions
    }

    pub fn intercepts_any(&self) -> bool {
        self.permissions.contains(CardPermissions::INTERCEPT_ANY)
    }

    pub fn holder(&self) -> Option<PlayerId> {
        self.holder
    }

    pub fn newest_holder(&self) -> Option<PlayerId> {
        self.newest_holder
    }

    /// Clearing the holder leaves `newest_holder` untouched.
    pub fn set_holder(&mut self, holder: Option<PlayerId>) {
        if holder.is_some() {
            self.newest_holder = holder;
        }
        self.holder = holder;
    }

    pub(crate) fn play(&mut self, players: &mut [Player]) -> Result<()> {
        let mut ctx = PlayContext::new(self.id, self.holder, players);
        self.effect.play(&mut ctx)
    }

    pub(crate) fn intercept_event(&mut self, event: &mut GameEvent) {
        self.effect.intercept_event(self.id, event)
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("permissions", &self.permissions)
            .field("holder", &self.holder)
            .field("newest_holder", &self.newest_holder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut PlayContext<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn holder_tracks_newest() {
        let mut card = Card::new(CardId(1), CardKind::Action, noop);
        assert_eq!(card.holder(), None);
        assert_eq!(card.newest_holder(), None);

        card.set_holder(Some(PlayerId(4)));
        assert_eq!(card.holder(), Some(PlayerId(4)));
        assert_eq!(card.newest_holder(), Some(PlayerId(4)));

        card.set_holder(None);
        assert_eq!(card.holder(), None);
        assert_eq!(card.newest_holder(), Some(PlayerId(4)));

        card.set_holder(Some(PlayerId(5)));
        assert_eq!(card.newest_holder(), Some(PlayerId(5)));
    }

    #[test]
    fn chaos_card_occurs_when_played() {
        let mut players = vec![Player::new(PlayerId(1), "ash", 10)];
        let mut card = Card::chaos(CardId(2), |ctx: &mut PlayContext<'_>| -> Result<()> {
            for player in ctx.players_mut() {
                player.health -= 3;
            }
            Ok(())
        });

        assert_eq!(card.kind(), CardKind::Chaos);
        card.play(&mut players).unwrap();
        assert_eq!(players[0].health, 7);
    }

    #[test]
    fn context_reports_unknown_player() {
        let mut players = Vec::new();
        let mut card = Card::new(CardId(3), CardKind::Action, |ctx: &mut PlayContext<'_>| -> Result<()> {
            ctx.player_mut(PlayerId(99)).map(|_| ())
        });
        let err = card.play(&mut players).unwrap_err();
        assert!(matches!(err, GameError::UnknownPlayer(PlayerId(99))));
    }

    #[test]
    fn refuse_names_the_card() {
        let mut players = Vec::new();
        let mut card = Card::new(CardId(8), CardKind::GhostAction, |ctx: &mut PlayContext<'_>| -> Result<()> {
            Err(ctx.refuse("holder is alive"))
        });
        let err = card.play(&mut players).unwrap_err();
        assert_eq!(err.to_string(), "card card-8 failed to resolve: holder is alive");
    }

    #[test]
    fn permissions_default_empty() {
        let card = Card::new(CardId(1), CardKind::Action, noop);
        assert!(!card.intercepts_any());
        let card = card.with_permissions(CardPermissions::INTERCEPT_ANY);
        assert!(card.intercepts_any());
    }
}
