use pong_shared::config::FieldConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate_hz: u32,
    /// Rate of positions events while a match runs
    pub broadcast_rate_hz: u32,
    /// Solver iterations per physics step
    pub solver_accuracy: usize,
    /// Ball speed on serve (m/s)
    pub serve_speed: f32,
    pub rng_seed: u64,
    /// Buffered events per subscriber before it starts lagging
    pub event_capacity: usize,
    /// Bots spawned by the headless binary
    pub bot_count: usize,
    pub field: FieldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            broadcast_rate_hz: 15,
            solver_accuracy: 10,
            serve_speed: 12.0,
            rng_seed: 42,
            event_capacity: 64,
            bot_count: 2,
            field: FieldConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 {
            return Err("tick_rate_hz must be > 0".to_string());
        }
        if self.broadcast_rate_hz == 0 || self.broadcast_rate_hz > self.tick_rate_hz {
            return Err(
                "broadcast_rate_hz must be > 0 and <= tick_rate_hz".to_string(),
            );
        }
        if self.solver_accuracy == 0 {
            return Err("solver_accuracy must be > 0".to_string());
        }
        if !self.serve_speed.is_finite() || self.serve_speed <= 0.0 {
            return Err("serve_speed must be finite and > 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be > 0".to_string());
        }
        if self.bot_count > 2 {
            return Err("bot_count must be <= 2".to_string());
        }
        self.field.validate()
    }

    /// Fixed simulation step in seconds
    /// Seconds per physics step. A zero rate counts as 1 Hz.
    pub fn tick_period(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }
}
