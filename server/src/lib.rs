//! Pong server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod bot;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod physics;
pub mod player;
pub mod slots;
pub mod state;
