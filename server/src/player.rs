use pong_shared::protocol::{PlayerId, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Joined,
    Ready,
}

/// A joined player and the side it defends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub side: Side,
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(id: PlayerId, side: Side) -> Self {
        Self {
            id,
            side,
            status: PlayerStatus::Joined,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == PlayerStatus::Ready
    }

    /// Returns true if the player was not ready before.
    pub fn mark_ready(&mut self) -> bool {
        let changed = !self.is_ready();
        self.status = PlayerStatus::Ready;
        changed
    }

    pub fn reset(&mut self) {
        self.status = PlayerStatus::Joined;
    }
}
