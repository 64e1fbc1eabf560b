//! Events that cards can inspect and rewrite while they are being resolved.

use serde::{Deserialize, Serialize};

use crate::card::CardId;

/// A value that interested cards may replace before it takes effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<T> {
    value: T,
    #[serde(default)]
    intercepted: bool,
}

impl<T> Event<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            intercepted: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Replace the carried value.
    pub fn intercept(&mut self, value: T) {
        self.value = value;
        self.intercepted = true;
    }

    /// Whether any interceptor has replaced the original value.
    pub fn was_intercepted(&self) -> bool {
        self.intercepted
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

pub type BooleanEvent = Event<bool>;

/// An action that goes ahead unless someone prevents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptEvent {
    action: String,
    proceed: BooleanEvent,
}

impl DisruptEvent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            proceed: Event::new(true),
        }
    }

    /// What is about to happen, e.g. `"draw"` or `"attack"`.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn prevent(&mut self) {
        self.proceed.intercept(false);
    }

    pub fn proceeds(&self) -> bool {
        *self.proceed.value()
    }

    pub fn is_prevented(&self) -> bool {
        !self.proceeds()
    }
}

/// Raised when a card intercepts another event.
///
/// Other cards get a chance to react to the interception itself, and
/// preventing it cancels the interception rather than the original event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptionEvent {
    intercepted_event: Box<GameEvent>,
    interception_source: CardId,
    disrupt: DisruptEvent,
}

impl InterceptionEvent {
    pub fn new(intercepted_event: GameEvent, interception_source: CardId) -> Self {
        Self {
            intercepted_event: Box::new(intercepted_event),
            interception_source,
            disrupt: DisruptEvent::new("intercept"),
        }
    }

    pub fn intercepted_event(&self) -> &GameEvent {
        &self.intercepted_event
    }

    pub fn intercepted_event_mut(&mut self) -> &mut GameEvent {
        &mut self.intercepted_event
    }

    pub fn interception_source(&self) -> CardId {
        self.interception_source
    }

    pub fn prevent(&mut self) {
        self.disrupt.prevent();
    }

    pub fn proceeds(&self) -> bool {
        self.disrupt.proceeds()
    }

    pub fn into_intercepted_event(self) -> GameEvent {
        *self.intercepted_event
    }
}

/// Everything that can travel through the interception chain or the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Flag(BooleanEvent),
    Disrupt(DisruptEvent),
    Interception(InterceptionEvent),
}

impl GameEvent {
    /// Whether the event still goes ahead. Flags report their current value.
    pub fn proceeds(&self) -> bool {
        match self {
            GameEvent::Flag(event) => *event.value(),
            GameEvent::Disrupt(event) => event.proceeds(),
            GameEvent::Interception(event) => event.proceeds(),
        }
    }
}

impl From<DisruptEvent> for GameEvent {
    fn from(event: DisruptEvent) -> Self {
        GameEvent::Disrupt(event)
    }
}

impl From<InterceptionEvent> for GameEvent {
    fn from(event: InterceptionEvent) -> Self {
        GameEvent::Interception(event)
    }
}

impl From<BooleanEvent> for GameEvent {
    fn from(event: BooleanEvent) -> Self {
        GameEvent::Flag(event)
    }
}
