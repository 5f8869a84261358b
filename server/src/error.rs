use pong_shared::protocol::{PlayerId, Side};
use std::fmt;

/// Errors raised by the physics adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsError {
    /// No paddle is attached on this side
    PaddleNotFound(Side),
    /// A paddle is already attached on this side
    PaddleExists(Side),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::PaddleNotFound(side) => write!(f, "No paddle on the {} side", side),
            PhysicsError::PaddleExists(side) => {
                write!(f, "A paddle already exists on the {} side", side)
            }
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Errors returned by the game session. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Both sides are taken
    CapacityReached,
    /// Command text is not recognised
    UnknownCommand(String),
    UnknownPlayer(PlayerId),
    Physics(PhysicsError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::CapacityReached => write!(f, "Maximum players limit has been reached"),
            SessionError::UnknownCommand(command) => write!(f, "Unknown command {}", command),
            SessionError::UnknownPlayer(id) => write!(f, "Unknown player {}", id),
            SessionError::Physics(e) => write!(f, "Physics error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Physics(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhysicsError> for SessionError {
    fn from(err: PhysicsError) -> Self {
        SessionError::Physics(err)
    }
}
