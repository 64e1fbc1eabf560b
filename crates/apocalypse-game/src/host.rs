use bitflags::bitflags;

bitflags! {
    /// What a game runtime does with the game loop.
    ///
    /// A host drives the loop and broadcasts it, a client only follows it,
    /// and a node relays in both directions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HostSettings: u8 {
        /// Owns the authoritative game loop.
        const CONTROL_GAME_LOOP = 0b001;
        /// Follows a game loop driven elsewhere.
        const RECEIVE_GAME_LOOP = 0b010;
        /// Pushes game loop updates to connected peers.
        const SEND_GAME_LOOP = 0b100;

        const HOST = Self::CONTROL_GAME_LOOP.bits() | Self::SEND_GAME_LOOP.bits();
        const CLIENT = Self::RECEIVE_GAME_LOOP.bits();
        const NODE = Self::SEND_GAME_LOOP.bits() | Self::RECEIVE_GAME_LOOP.bits();
    }
}

impl HostSettings {
    pub fn controls_game_loop(self) -> bool {
        self.contains(Self::CONTROL_GAME_LOOP)
    }

    pub fn receives_game_loop(self) -> bool {
        self.contains(Self::RECEIVE_GAME_LOOP)
    }

    pub fn sends_game_loop(self) -> bool {
        self.contains(Self::SEND_GAME_LOOP)
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self::HOST
    }
}
