//! Types shared between the pong server and any UI consuming its events.

pub mod config;
pub mod protocol;
pub mod vec2;
