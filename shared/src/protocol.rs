use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::vec2::Vec2;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

pub type PlayerId = u32;

/// Which side of the field a player defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, in slot order.
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Text commands a player may send to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Ready,
}

impl FromStr for PlayerCommand {
    /// The rejected command text
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(PlayerCommand::Ready),
            other => Err(other.to_string()),
        }
    }
}

// === Snapshots ===

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaddlePositions {
    pub left: Option<Vec2>,
    pub right: Option<Vec2>,
}

impl PaddlePositions {
    pub fn get(&self, side: Side) -> Option<Vec2> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Positions {
    pub ball: Vec2,
    pub paddles: PaddlePositions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Score {
    pub left: u32,
    pub right: u32,
}

impl Score {
    pub fn increment(&mut self, side: Side) {
        match side {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    /// Waiting for every joined player to send READY
    Waiting,
    /// Simulation is running
    Started,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GameParams {
    pub protocol_version: u32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub ball_radius: f32,
    pub phase: GamePhase,
    pub score: Score,
}

// === Events ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEvent {
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        side: Side,
    },
    GameStarted,
    BallScored {
        side: Side,
        score: Score,
    },
    Positions(Positions),
}
