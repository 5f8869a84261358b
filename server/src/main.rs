use pong_server::config::ServerConfig;
use pong_server::game_loop::{run_game_loop, GameCommand};
use pong_server::physics::{Physics, PhysicsWorld};
use pong_server::state::GameState;
use pong_shared::protocol::GameEvent;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Length of the headless bot match
const MATCH_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::default();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let field = config.field;
    let mut physics = PhysicsWorld::new(field.width, field.height, field.ball_radius);
    physics.on_ball_scored(Box::new(|side| {
        tracing::debug!("Ball reached the wall, {} side scores", side);
    }));
    let state = GameState::new(physics, &config);
    let mut events = state.subscribe();

    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);

    // Spawn game loop
    let loop_config = config.clone();
    let game = tokio::spawn(async move {
        run_game_loop(game_rx, state, loop_config).await;
    });

    // Print lifecycle events as JSON lines
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(GameEvent::Positions(_)) => {}
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => println!("{}", json),
                    Err(e) => tracing::error!("Failed to encode event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event printer lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    for _ in 0..config.bot_count {
        let (resp_tx, resp_rx) = oneshot::channel();
        if game_tx
            .send(GameCommand::AddBot { response: resp_tx })
            .await
            .is_err()
        {
            tracing::error!("Failed to send AddBot command");
            return;
        }
        match resp_rx.await {
            Ok(Ok(id)) => tracing::info!("Bot player {} joined", id),
            Ok(Err(e)) => tracing::error!("Bot could not join: {}", e),
            Err(_) => {
                tracing::error!("Game loop dropped the AddBot response");
                return;
            }
        }
    }

    tracing::info!("Running a {}s bot match", MATCH_DURATION.as_secs());
    tokio::time::sleep(MATCH_DURATION).await;

    let (resp_tx, resp_rx) = oneshot::channel();
    if game_tx
        .send(GameCommand::Snapshot { response: resp_tx })
        .await
        .is_ok()
    {
        if let Ok((params, _)) = resp_rx.await {
            println!(
                "Final score: left {} - right {}",
                params.score.left, params.score.right
            );
        }
    }

    drop(game_tx);
    let _ = game.await;
}
