//! Computer-controlled paddles.
//!
//! Bots are lightweight trackers that:
//! - Watch the ball through position snapshots
//! - Follow it while it approaches their side, drift back to mid-height otherwise
//! - Return paddle pushes via `tick()`

use pong_shared::protocol::{PlayerId, Positions, Side};
use pong_shared::vec2::{vec2, Vec2};
use rand::Rng;

/// Push force at full strength (N)
const BOT_PUSH_FORCE: f32 = 120.0;

/// Bot personality affects precision and effort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotPersonality {
    /// Tracks tightly with full force
    Eager,
    /// Tolerates a large offset and pushes gently
    Relaxed,
    /// Random effort and aim every tick
    Chaotic,
}

impl BotPersonality {
    /// Vertical offset (m) the bot tolerates before pushing
    fn dead_zone(&self) -> f32 {
        match self {
            BotPersonality::Eager => 0.1,
            BotPersonality::Relaxed => 0.6,
            BotPersonality::Chaotic => 0.3,
        }
    }

    /// Fraction of the full push force
    fn strength(&self, rng: &mut impl Rng) -> f32 {
        match self {
            BotPersonality::Eager => 1.0,
            BotPersonality::Relaxed => 0.6,
            BotPersonality::Chaotic => 0.3 + rng.gen::<f32>() * 1.0, // 0.3-1.3
        }
    }

    /// Random aim error (m) added to the target
    fn aim_error(&self, rng: &mut impl Rng) -> f32 {
        match self {
            BotPersonality::Eager => 0.0,
            BotPersonality::Relaxed => rng.gen_range(-0.3..0.3),
            BotPersonality::Chaotic => rng.gen_range(-1.5..1.5),
        }
    }

    /// Select a random personality
    pub fn random(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => BotPersonality::Eager,
            1 => BotPersonality::Relaxed,
            _ => BotPersonality::Chaotic,
        }
    }
}

/// A bot controlling one paddle
#[derive(Debug)]
pub struct BotPlayer {
    /// The player ID the bot plays as
    pub player_id: PlayerId,
    pub side: Side,
    pub personality: BotPersonality,
    /// Height to return to while the ball moves away
    rest_y: f32,
    last_ball: Option<Vec2>,
}

impl BotPlayer {
    pub fn new(player_id: PlayerId, side: Side, personality: BotPersonality, rest_y: f32) -> Self {
        Self {
            player_id,
            side,
            personality,
            rest_y,
            last_ball: None,
        }
    }

    fn ball_approaching(&self, ball: Vec2) -> bool {
        let Some(last) = self.last_ball else {
            return false;
        };
        match self.side {
            Side::Left => ball.x < last.x,
            Side::Right => ball.x > last.x,
        }
    }

    /// Look at the field. Returns Some(force) if the bot wants to push.
    pub fn tick(&mut self, positions: &Positions, rng: &mut impl Rng) -> Option<Vec2> {
        let paddle = positions.paddles.get(self.side)?;
        let ball = positions.ball;

        let target = if self.ball_approaching(ball) {
            ball.y + self.personality.aim_error(rng)
        } else {
            self.rest_y
        };
        self.last_ball = Some(ball);

        let offset = target - paddle.y;
        if offset.abs() < self.personality.dead_zone() {
            return None;
        }
        let force = BOT_PUSH_FORCE * self.personality.strength(rng);
        Some(vec2(0.0, force.copysign(offset)))
    }
}

/// Manages all bot players
#[derive(Debug, Default)]
pub struct BotManager {
    /// List of bot players (public for testing)
    pub bots: Vec<BotPlayer>,
}

impl BotManager {
    pub fn new() -> Self {
        Self { bots: Vec::new() }
    }

    /// Add a bot for the given player
    pub fn add_bot(&mut self, player_id: PlayerId, side: Side, rest_y: f32, rng: &mut impl Rng) {
        let personality = BotPersonality::random(rng);
        tracing::info!(
            "Bot {} created on the {} side with {:?} personality",
            player_id,
            side,
            personality
        );
        self.bots
            .push(BotPlayer::new(player_id, side, personality, rest_y));
    }

    /// Remove a bot by player ID
    pub fn remove_bot(&mut self, player_id: PlayerId) {
        self.bots.retain(|b| b.player_id != player_id);
    }

    /// Tick all bots. Returns list of (player_id, force) pushes.
    pub fn tick(&mut self, positions: &Positions, rng: &mut impl Rng) -> Vec<(PlayerId, Vec2)> {
        self.bots
            .iter_mut()
            .filter_map(|bot| bot.tick(positions, rng).map(|force| (bot.player_id, force)))
            .collect()
    }

    /// Get number of active bots
    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }
}
