//! Apocalypse: a multiplayer card game runtime.
//!
//! Game hosts and players exchange discrete messages over byte streams. Each
//! message travels as a 4-byte big-endian length followed by its payload,
//! and every receive is bounded by a timeout.
//!
//! # Crate Structure
//!
//! - [`transport`]: fragment sources (Unix sockets, TCP, in-process pipes)
//! - [`frame`]: length-prefixed framing and timed frame channels
//! - [`game`]: session model, cards, events and framed game connections

/// Re-export transport types.
pub mod transport {
    pub use apocalypse_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use apocalypse_frame::*;
}

/// Re-export game types.
pub mod game {
    pub use apocalypse_game::*;
}
