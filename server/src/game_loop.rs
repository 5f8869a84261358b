use crate::bot::BotManager;
use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::physics::Physics;
use crate::state::GameState;
use pong_shared::protocol::{GameParams, GamePhase, PlayerId, Positions};
use pong_shared::vec2::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Commands from players (or their transport) to the game loop
pub enum GameCommand {
    PlayerJoin {
        response: oneshot::Sender<Result<PlayerId, SessionError>>,
    },
    PlayerLeave {
        id: PlayerId,
        response: oneshot::Sender<Result<(), SessionError>>,
    },
    PlayerCommand {
        id: PlayerId,
        command: String,
        response: oneshot::Sender<Result<(), SessionError>>,
    },
    PushPaddle {
        id: PlayerId,
        direction: Vec2,
    },
    /// Join a computer-controlled player and mark it ready
    AddBot {
        response: oneshot::Sender<Result<PlayerId, SessionError>>,
    },
    Snapshot {
        response: oneshot::Sender<(GameParams, Positions)>,
    },
}

/// Run the main game loop. Owns the session and, through it, the physics
/// world. Ends once every command sender is dropped. Zero rates in `config`
/// are treated as 1 Hz.
pub async fn run_game_loop<P: Physics>(
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    mut state: GameState<P>,
    config: ServerConfig,
) {
    let period = config.tick_period();
    let tick_duration = Duration::from_secs_f32(period);
    let broadcast_every_n = (config.tick_rate_hz / config.broadcast_rate_hz.max(1)).max(1) as u64;
    let rest_y = config.field.height / 2.0;
    let mut tick_count: u64 = 0;

    let mut bots = BotManager::new();
    let mut bot_rng = ChaCha8Rng::seed_from_u64(config.rng_seed.wrapping_add(1));

    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                if state.phase() != GamePhase::Started {
                    continue;
                }

                let positions = state.object_positions();
                for (id, force) in bots.tick(&positions, &mut bot_rng) {
                    if let Err(e) = state.push_paddle(id, force) {
                        tracing::warn!("Bot {} push failed: {}", id, e);
                    }
                }

                state.tick(period);

                // Broadcast positions at lower rate
                tick_count += 1;
                if tick_count % broadcast_every_n == 0 {
                    state.publish_positions();
                }
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    GameCommand::PlayerJoin { response } => {
                        let _ = response.send(state.join_player());
                    }
                    GameCommand::PlayerLeave { id, response } => {
                        let result = state.leave_player(id);
                        if result.is_ok() {
                            bots.remove_bot(id);
                        }
                        let _ = response.send(result);
                    }
                    GameCommand::PlayerCommand { id, command, response } => {
                        let _ = response.send(state.handle_player_command(id, &command));
                    }
                    GameCommand::PushPaddle { id, direction } => {
                        if let Err(e) = state.push_paddle(id, direction) {
                            tracing::warn!("Push from player {} rejected: {}", id, e);
                        }
                    }
                    GameCommand::AddBot { response } => {
                        let result = add_bot(&mut state, &mut bots, rest_y, &mut bot_rng);
                        let _ = response.send(result);
                    }
                    GameCommand::Snapshot { response } => {
                        let snapshot = (state.parameters_and_state(), state.object_positions());
                        let _ = response.send(snapshot);
                    }
                }
            }
        }
    }

    tracing::info!("Game loop ended");
}

fn add_bot<P: Physics>(
    state: &mut GameState<P>,
    bots: &mut BotManager,
    rest_y: f32,
    rng: &mut ChaCha8Rng,
) -> Result<PlayerId, SessionError> {
    let id = state.join_player()?;
    if let Some(side) = state.player(id).map(|p| p.side) {
        bots.add_bot(id, side, rest_y, rng);
    }
    state.handle_player_command(id, "READY")?;
    Ok(id)
}
