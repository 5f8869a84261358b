use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::physics::{PaddleSize, Physics, PhysicsWorld};
use crate::player::Player;
use crate::slots::SideSlots;
use pong_shared::config::FieldConfig;
use pong_shared::protocol::{
    GameEvent, GameParams, GamePhase, PlayerCommand, PlayerId, Positions, Score, Side,
    PROTOCOL_VERSION,
};
use pong_shared::vec2::{scale, vec2, Vec2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

/// Largest serve angle away from the horizontal (radians)
const MAX_SERVE_ANGLE: f32 = std::f32::consts::FRAC_PI_4;

/// Two-player session: joining, readiness, scoring. Owns the physics world.
pub struct GameState<P: Physics = PhysicsWorld> {
    physics: P,
    field: FieldConfig,
    serve_speed: f32,
    solver_accuracy: usize,
    players: SideSlots<Player>,
    phase: GamePhase,
    score: Score,
    rng: ChaCha8Rng,
    next_player_id: PlayerId,
    events: broadcast::Sender<GameEvent>,
}

impl GameState<PhysicsWorld> {
    /// Session over a fresh physics world sized from `config.field`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let field = &config.field;
        let physics = PhysicsWorld::new(field.width, field.height, field.ball_radius);
        Self::new(physics, config)
    }
}

impl<P: Physics> GameState<P> {
    pub fn new(physics: P, config: &ServerConfig) -> Self {
        use rand::SeedableRng;
        // tokio rejects a zero-capacity channel
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            physics,
            field: config.field,
            serve_speed: config.serve_speed,
            solver_accuracy: config.solver_accuracy,
            players: SideSlots::new(),
            phase: GamePhase::Waiting,
            score: Score::default(),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            next_player_id: 1,
            events,
        }
    }

    /// Receiver for every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn paddle_size(&self) -> PaddleSize {
        PaddleSize {
            width: self.field.paddle_width,
            height: self.field.paddle_height,
        }
    }

    fn side_of(&self, id: PlayerId) -> Option<Side> {
        self.players
            .iter()
            .find(|(_, p)| p.id == id)
            .map(|(side, _)| side)
    }

    /// Add a player on the first free side and give it a paddle.
    pub fn join_player(&mut self) -> Result<PlayerId, SessionError> {
        let side = self
            .players
            .first_free()
            .ok_or(SessionError::CapacityReached)?;
        self.physics.add_paddle(side, self.paddle_size())?;

        let id = self.next_player_id;
        self.next_player_id += 1;
        self.players
            .insert(side, Player::new(id, side))
            .map_err(|_| SessionError::CapacityReached)?;

        if self.phase == GamePhase::Started {
            // Newcomer has to ready up before play resumes
            self.phase = GamePhase::Waiting;
            tracing::info!("Match paused until player {} is ready", id);
        }

        tracing::info!("Player {} joined on the {} side", id, side);
        self.emit(GameEvent::PlayerJoined {
            player_id: id,
            side,
        });
        Ok(id)
    }

    /// Remove a player and its paddle. Play stops and every remaining player
    /// has to send READY again.
    pub fn leave_player(&mut self, id: PlayerId) -> Result<(), SessionError> {
        let side = self.side_of(id).ok_or(SessionError::UnknownPlayer(id))?;
        self.physics.remove_paddle(side)?;
        self.players.take(side);

        for player in self.players.values_mut() {
            player.reset();
        }
        self.phase = GamePhase::Waiting;
        self.physics.position_ball(self.field.center(), Vec2::ZERO);
        if self.players.is_empty() {
            self.score = Score::default();
        }

        tracing::info!("Player {} left the {} side", id, side);
        Ok(())
    }

    /// Apply a text command from a player. Only `READY` is understood.
    pub fn handle_player_command(
        &mut self,
        id: PlayerId,
        command: &str,
    ) -> Result<(), SessionError> {
        let command = command.parse::<PlayerCommand>().map_err(|unknown| {
            tracing::warn!("Player {} sent unknown command {:?}", id, unknown);
            SessionError::UnknownCommand(unknown)
        })?;
        let side = self.side_of(id).ok_or(SessionError::UnknownPlayer(id))?;

        match command {
            PlayerCommand::Ready => self.mark_ready(side),
        }
        Ok(())
    }

    fn mark_ready(&mut self, side: Side) {
        if let Some(player) = self.players.get_mut(side) {
            if player.mark_ready() {
                tracing::info!("Player {} is ready", player.id);
            }
        }

        let all_ready = self.players.iter().all(|(_, p)| p.is_ready());
        if self.phase == GamePhase::Waiting && all_ready {
            self.start();
        }
    }

    fn start(&mut self) {
        self.phase = GamePhase::Started;
        tracing::info!("Game started with {} player(s)", self.players.len());
        self.emit(GameEvent::GameStarted);

        let toward = if self.rng.gen::<bool>() {
            Side::Left
        } else {
            Side::Right
        };
        self.serve(toward);
    }

    /// Put the ball at the center, heading for `toward` at a random angle.
    fn serve(&mut self, toward: Side) {
        let angle = self.rng.gen_range(-MAX_SERVE_ANGLE..MAX_SERVE_ANGLE);
        let dir_x = match toward {
            Side::Left => -1.0,
            Side::Right => 1.0,
        };
        let velocity = scale(vec2(dir_x * angle.cos(), angle.sin()), self.serve_speed);
        self.physics.position_ball(self.field.center(), velocity);
    }

    /// Forward a push from a player to its paddle. Pushes outside a running
    /// match are dropped, otherwise they would pile up until the first step.
    pub fn push_paddle(&mut self, id: PlayerId, direction: Vec2) -> Result<(), SessionError> {
        let side = self.side_of(id).ok_or(SessionError::UnknownPlayer(id))?;
        if self.phase != GamePhase::Started {
            tracing::debug!("Push from player {} dropped while waiting", id);
            return Ok(());
        }
        self.physics.give_impulse_to_paddle(side, direction)?;
        Ok(())
    }

    /// Advance the match by `period` seconds. Does nothing until started.
    /// Returns the sides that scored during this step.
    pub fn tick(&mut self, period: f32) -> Vec<Side> {
        if self.phase != GamePhase::Started {
            return Vec::new();
        }

        let scored = self.physics.tick(period, self.solver_accuracy);
        for &side in &scored {
            self.score.increment(side);
            tracing::info!(
                "The {} side scored ({}:{})",
                side,
                self.score.left,
                self.score.right
            );
            self.emit(GameEvent::BallScored {
                side,
                score: self.score,
            });
            self.serve(side.opposite());
        }
        scored
    }

    /// Emit the current positions to subscribers.
    pub fn publish_positions(&self) {
        self.emit(GameEvent::Positions(self.object_positions()));
    }

    pub fn object_positions(&self) -> Positions {
        self.physics.ball_and_paddle_positions()
    }

    pub fn parameters_and_state(&self) -> GameParams {
        GameParams {
            protocol_version: PROTOCOL_VERSION,
            width: self.field.width,
            height: self.field.height,
            scale: self.field.scale,
            ball_radius: self.field.ball_radius,
            phase: self.phase,
            score: self.score,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.side_of(id).and_then(|side| self.players.get(side))
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhysicsError;
    use crate::physics::BallScoredCallback;
    use crate::player::PlayerStatus;
    use pong_shared::protocol::PaddlePositions;
    use tokio::sync::broadcast::error::TryRecvError;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        AddPaddle(Side, PaddleSize),
        RemovePaddle(Side),
        PositionBall(Vec2, Vec2),
        Tick(f32, usize),
        Impulse(Side, Vec2),
    }

    /// Records calls; `tick` returns whatever is queued in `scores`.
    #[derive(Default)]
    struct MockPhysics {
        calls: Vec<Call>,
        paddles: SideSlots<()>,
        scores: Vec<Side>,
        ball: Vec2,
    }

    impl MockPhysics {
        fn ticks(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Tick(..)))
                .count()
        }

        fn last_ball(&self) -> Option<(Vec2, Vec2)> {
            self.calls.iter().rev().find_map(|c| match c {
                Call::PositionBall(p, v) => Some((*p, *v)),
                _ => None,
            })
        }
    }

    impl Physics for MockPhysics {
        fn add_paddle(&mut self, side: Side, size: PaddleSize) -> Result<(), PhysicsError> {
            self.calls.push(Call::AddPaddle(side, size));
            self.paddles
                .insert(side, ())
                .map_err(|_| PhysicsError::PaddleExists(side))
        }

        fn remove_paddle(&mut self, side: Side) -> Result<(), PhysicsError> {
            self.calls.push(Call::RemovePaddle(side));
            self.paddles
                .take(side)
                .ok_or(PhysicsError::PaddleNotFound(side))
        }

        fn position_ball(&mut self, position: Vec2, velocity: Vec2) {
            self.ball = position;
            self.calls.push(Call::PositionBall(position, velocity));
        }

        fn tick(&mut self, period: f32, accuracy: usize) -> Vec<Side> {
            self.calls.push(Call::Tick(period, accuracy));
            std::mem::take(&mut self.scores)
        }

        fn ball_and_paddle_positions(&self) -> Positions {
            Positions {
                ball: self.ball,
                paddles: PaddlePositions::default(),
            }
        }

        fn give_impulse_to_paddle(
            &mut self,
            side: Side,
            direction: Vec2,
        ) -> Result<(), PhysicsError> {
            self.calls.push(Call::Impulse(side, direction));
            self.paddles
                .get(side)
                .map(|_| ())
                .ok_or(PhysicsError::PaddleNotFound(side))
        }

        fn on_ball_scored(&mut self, _callback: BallScoredCallback) {}
    }

    fn test_game() -> GameState<MockPhysics> {
        GameState::new(MockPhysics::default(), &ServerConfig::default())
    }

    fn started_game() -> (GameState<MockPhysics>, PlayerId, PlayerId) {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        let p2 = game.join_player().unwrap();
        game.handle_player_command(p1, "READY").unwrap();
        game.handle_player_command(p2, "READY").unwrap();
        (game, p1, p2)
    }

    fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[test]
    fn zero_event_capacity_still_delivers() {
        let config = ServerConfig {
            event_capacity: 0,
            ..Default::default()
        };
        let mut game = GameState::new(MockPhysics::default(), &config);
        let mut rx = game.subscribe();
        game.join_player().unwrap();
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn join_returns_unique_ids() {
        let mut game = test_game();
        let id1 = game.join_player().unwrap();
        let id2 = game.join_player().unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn third_join_is_rejected() {
        let mut game = test_game();
        game.join_player().unwrap();
        game.join_player().unwrap();

        let err = game.join_player().unwrap_err();
        assert_eq!(err, SessionError::CapacityReached);
        assert_eq!(err.to_string(), "Maximum players limit has been reached");
        assert_eq!(game.players.len(), 2);
        // No paddle was created for the rejected join
        let adds = game
            .physics()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::AddPaddle(..)))
            .count();
        assert_eq!(adds, 2);
    }

    #[test]
    fn join_adds_paddles_left_then_right() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        let p2 = game.join_player().unwrap();

        let field = FieldConfig::default();
        let size = PaddleSize {
            width: field.paddle_width,
            height: field.paddle_height,
        };
        assert_eq!(
            game.physics().calls,
            vec![
                Call::AddPaddle(Side::Left, size),
                Call::AddPaddle(Side::Right, size)
            ]
        );
        assert_eq!(game.player(p1).unwrap().side, Side::Left);
        assert_eq!(game.player(p2).unwrap().side, Side::Right);
    }

    #[test]
    fn join_emits_player_joined_with_returned_id() {
        let mut game = test_game();
        let mut rx = game.subscribe();
        let id = game.join_player().unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![GameEvent::PlayerJoined {
                player_id: id,
                side: Side::Left
            }]
        );
    }

    #[test]
    fn unknown_command_is_rejected_by_name() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        game.handle_player_command(p1, "READY").unwrap();

        let err = game.handle_player_command(p1, "SHMREADY").unwrap_err();
        assert_eq!(err, SessionError::UnknownCommand("SHMREADY".to_string()));
        assert_eq!(err.to_string(), "Unknown command SHMREADY");
        assert_eq!(game.player(p1).unwrap().status, PlayerStatus::Ready);
        assert_eq!(game.phase(), GamePhase::Started);
    }

    #[test]
    fn unknown_command_leaves_waiting_player_unready() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        assert!(game.handle_player_command(p1, "GO").is_err());
        assert_eq!(game.player(p1).unwrap().status, PlayerStatus::Joined);
        assert_eq!(game.phase(), GamePhase::Waiting);
    }

    #[test]
    fn command_from_unknown_player_is_rejected() {
        let mut game = test_game();
        assert_eq!(
            game.handle_player_command(99, "READY"),
            Err(SessionError::UnknownPlayer(99))
        );
    }

    #[test]
    fn single_ready_player_starts_game() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        let mut rx = game.subscribe();
        game.handle_player_command(p1, "READY").unwrap();
        assert_eq!(game.phase(), GamePhase::Started);
        assert_eq!(drain(&mut rx), vec![GameEvent::GameStarted]);
    }

    #[test]
    fn game_waits_for_every_player() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        game.join_player().unwrap();
        let mut rx = game.subscribe();

        game.handle_player_command(p1, "READY").unwrap();
        assert_eq!(game.phase(), GamePhase::Waiting);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn game_started_fires_exactly_once() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        let p2 = game.join_player().unwrap();
        let mut rx = game.subscribe();

        game.handle_player_command(p1, "READY").unwrap();
        game.handle_player_command(p2, "READY").unwrap();
        game.handle_player_command(p2, "READY").unwrap();
        game.handle_player_command(p1, "READY").unwrap();

        let started = drain(&mut rx)
            .into_iter()
            .filter(|e| *e == GameEvent::GameStarted)
            .count();
        assert_eq!(started, 1);
    }

    #[test]
    fn start_serves_from_center_at_serve_speed() {
        let (game, _, _) = started_game();
        let (position, velocity) = game.physics().last_ball().unwrap();
        assert_eq!(position, FieldConfig::default().center());
        let speed = ServerConfig::default().serve_speed;
        assert!((velocity.x.hypot(velocity.y) - speed).abs() < 1e-4);
        // Never steeper than 45 degrees
        assert!(velocity.x.abs() >= velocity.y.abs() - 1e-4);
    }

    #[test]
    fn tick_is_ignored_before_start() {
        let mut game = test_game();
        game.join_player().unwrap();
        assert!(game.tick(0.016).is_empty());
        assert_eq!(game.physics().ticks(), 0);
    }

    #[test]
    fn tick_forwards_period_and_accuracy() {
        let (mut game, _, _) = started_game();
        game.tick(0.016);
        assert!(game
            .physics()
            .calls
            .contains(&Call::Tick(0.016, ServerConfig::default().solver_accuracy)));
    }

    #[test]
    fn score_updates_and_reserves_toward_conceding_side() {
        let (mut game, _, _) = started_game();
        let mut rx = game.subscribe();
        game.physics.scores = vec![Side::Right];

        assert_eq!(game.tick(0.016), vec![Side::Right]);
        assert_eq!(game.score(), Score { left: 0, right: 1 });
        assert_eq!(
            drain(&mut rx),
            vec![GameEvent::BallScored {
                side: Side::Right,
                score: Score { left: 0, right: 1 }
            }]
        );

        let (position, velocity) = game.physics().last_ball().unwrap();
        assert_eq!(position, FieldConfig::default().center());
        assert!(velocity.x < 0.0, "serve should head left: {:?}", velocity);
    }

    #[test]
    fn push_paddle_targets_player_side() {
        let (mut game, _, p2) = started_game();
        game.push_paddle(p2, vec2(0.0, 3.0)).unwrap();
        assert!(game
            .physics()
            .calls
            .contains(&Call::Impulse(Side::Right, vec2(0.0, 3.0))));
        assert_eq!(
            game.push_paddle(42, vec2(0.0, 1.0)),
            Err(SessionError::UnknownPlayer(42))
        );
    }

    #[test]
    fn push_while_waiting_is_dropped() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        game.push_paddle(p1, vec2(0.0, -200.0)).unwrap();
        assert!(!game
            .physics()
            .calls
            .iter()
            .any(|c| matches!(c, Call::Impulse(..))));
        assert_eq!(
            game.push_paddle(42, vec2(0.0, 1.0)),
            Err(SessionError::UnknownPlayer(42))
        );
    }

    #[test]
    fn push_during_join_pause_is_dropped() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        game.handle_player_command(p1, "READY").unwrap();
        game.join_player().unwrap();
        assert_eq!(game.phase(), GamePhase::Waiting);

        game.push_paddle(p1, vec2(0.0, 5.0)).unwrap();
        assert!(!game
            .physics()
            .calls
            .contains(&Call::Impulse(Side::Left, vec2(0.0, 5.0))));
    }

    #[test]
    fn lobby_pushes_do_not_carry_into_first_step() {
        let config = ServerConfig::default();
        let mut game = GameState::from_config(&config);
        let p1 = game.join_player().unwrap();
        let start = game.object_positions().paddles.left.unwrap();

        for _ in 0..200 {
            game.push_paddle(p1, vec2(0.0, -200.0)).unwrap();
        }
        game.handle_player_command(p1, "READY").unwrap();
        game.tick(config.tick_period());

        let end = game.object_positions().paddles.left.unwrap();
        assert!(
            (end.y - start.y).abs() < 0.01,
            "stale pushes moved the paddle: {:?} -> {:?}",
            start,
            end
        );
    }

    #[test]
    fn leave_frees_side_and_stops_play() {
        let (mut game, p1, p2) = started_game();
        game.leave_player(p1).unwrap();

        assert!(game
            .physics()
            .calls
            .contains(&Call::RemovePaddle(Side::Left)));
        assert_eq!(game.phase(), GamePhase::Waiting);
        assert_eq!(game.player(p2).unwrap().status, PlayerStatus::Joined);
        assert!(game.player(p1).is_none());

        let p3 = game.join_player().unwrap();
        assert_eq!(game.player(p3).unwrap().side, Side::Left);
    }

    #[test]
    fn leave_unknown_player_is_rejected() {
        let mut game = test_game();
        assert_eq!(game.leave_player(5), Err(SessionError::UnknownPlayer(5)));
    }

    #[test]
    fn score_resets_when_everyone_leaves() {
        let (mut game, p1, p2) = started_game();
        game.physics.scores = vec![Side::Left];
        game.tick(0.016);
        assert_eq!(game.score().left, 1);

        game.leave_player(p1).unwrap();
        assert_eq!(game.score().left, 1);
        game.leave_player(p2).unwrap();
        assert_eq!(game.score(), Score::default());
    }

    #[test]
    fn join_during_match_pauses_until_ready() {
        let mut game = test_game();
        let p1 = game.join_player().unwrap();
        game.handle_player_command(p1, "READY").unwrap();
        assert_eq!(game.phase(), GamePhase::Started);

        let p2 = game.join_player().unwrap();
        assert_eq!(game.phase(), GamePhase::Waiting);
        game.handle_player_command(p2, "READY").unwrap();
        assert_eq!(game.phase(), GamePhase::Started);
    }

    #[test]
    fn parameters_reflect_field_and_state() {
        let (game, _, _) = started_game();
        let params = game.parameters_and_state();
        let field = FieldConfig::default();
        assert_eq!(params.protocol_version, PROTOCOL_VERSION);
        assert_eq!(params.width, field.width);
        assert_eq!(params.height, field.height);
        assert_eq!(params.scale, field.scale);
        assert_eq!(params.phase, GamePhase::Started);
        assert_eq!(params.score, Score::default());
    }

    #[test]
    fn publish_positions_emits_snapshot() {
        let game = test_game();
        let mut rx = game.subscribe();
        game.publish_positions();
        assert_eq!(
            drain(&mut rx),
            vec![GameEvent::Positions(game.object_positions())]
        );
    }

    #[test]
    fn real_world_match_keeps_ball_inside_field() {
        let config = ServerConfig::default();
        let mut game = GameState::from_config(&config);
        let p1 = game.join_player().unwrap();
        let p2 = game.join_player().unwrap();
        game.handle_player_command(p1, "READY").unwrap();
        game.handle_player_command(p2, "READY").unwrap();

        let positions = game.object_positions();
        assert!(positions.paddles.left.is_some());
        assert!(positions.paddles.right.is_some());

        game.tick(config.tick_period());
        let center = config.field.center();
        assert_ne!(
            game.object_positions().ball,
            center,
            "served ball should move"
        );

        for _ in 0..600 {
            game.tick(config.tick_period());
            let ball = game.object_positions().ball;
            assert!(ball.x > -0.5 && ball.x < config.field.width + 0.5);
            assert!(ball.y > -0.5 && ball.y < config.field.height + 0.5);
        }
    }
}
