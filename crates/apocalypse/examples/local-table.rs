//! A host and two in-process players resolving one round of cards.
//!
//! Run with:
//!   cargo run --example local-table

use std::time::Duration;

use apocalypse::game::{
    local_pair, Card, CardEffect, CardId, CardKind, CardPermissions, ConnectionConfig,
    DisruptEvent, GameEvent, GameSession, HostSettings, PlayContext, Player, PlayerId,
};

/// Blocks every attack while it is registered.
struct Shield;

impl CardEffect for Shield {
    fn play(&mut self, _ctx: &mut PlayContext<'_>) -> apocalypse::game::Result<()> {
        Ok(())
    }

    fn intercept_event(&mut self, _card: CardId, event: &mut GameEvent) {
        if let GameEvent::Disrupt(disrupt) = event {
            if disrupt.action() == "attack" {
                disrupt.prevent();
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = GameSession::new(HostSettings::HOST);
    session.add_player(Player::new(PlayerId(1), "ash", 10))?;
    session.add_player(Player::new(PlayerId(2), "birch", 10))?;

    // Every player loses two health when this one occurs.
    let storm = session.register_card(Card::chaos(
        CardId(1),
        |ctx: &mut PlayContext<'_>| -> apocalypse::game::Result<()> {
            for player in ctx.players_mut() {
                player.health -= 2;
            }
            Ok(())
        },
    ))?;

    let shield =
        Card::new(CardId(2), CardKind::Action, Shield).with_permissions(CardPermissions::INTERCEPT_ANY);
    let shield = session.register_card(shield)?;
    session.give_card(shield, PlayerId(2))?;

    let config = ConnectionConfig::default();
    let (mut to_ash, mut ash) = local_pair("ash", &config);

    session.play_card(storm)?;
    for player in session.players() {
        eprintln!("{} has {} health", player.name, player.health);
    }

    let mut attack = GameEvent::from(DisruptEvent::new("attack"));
    let consulted = session.dispatch_event(&mut attack);
    eprintln!("{consulted} interceptor(s) consulted, attack proceeds: {}", attack.proceeds());

    to_ash.send_message(&attack)?;
    let seen: GameEvent = ash.receive_message(Duration::from_secs(1))?;
    eprintln!("ash saw {seen:?}");

    Ok(())
}
