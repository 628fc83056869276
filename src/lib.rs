pub mod backend;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod game;
pub mod models;
pub mod token;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::backend::RoomCommand;
use crate::config::GameConfig;
use crate::engine::facade::SessionConfig;
use crate::engine::EngineFactory;
use crate::events::create_event_bus;
use crate::game::orchestrator::{run_game_session, CallDeps};
use crate::game::{GameHandle, GameState};
use crate::token::TokenProvider;

/// Wire up and spawn one game session.
///
/// The returned handle carries the intent sender, the observable state
/// snapshot and the notification bus. The session loop runs until the
/// handle's command sender is dropped.
pub fn spawn_game_session(
    config: GameConfig,
    session_config: SessionConfig,
    tokens: Arc<dyn TokenProvider>,
    factory: Arc<dyn EngineFactory>,
    backend_tx: mpsc::Sender<RoomCommand>,
) -> GameHandle {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (event_tx, _event_rx) = create_event_bus();
    let (state_tx, state_rx) = watch::channel(GameState::default());

    let call = CallDeps {
        config: session_config,
        tokens,
        factory,
    };
    tokio::spawn(run_game_session(
        command_rx,
        command_tx.clone(),
        backend_tx,
        event_tx.clone(),
        state_tx,
        call,
        config,
    ));

    GameHandle {
        command_tx,
        state_rx,
        event_tx,
    }
}
