use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::seq::SliceRandom;
use tracing::info;

use howlr::backend::local::LocalRoomBackend;
use howlr::config::GameConfig;
use howlr::engine::facade::SessionConfig;
use howlr::engine::loopback::{FailingFactory, LoopbackFactory};
use howlr::game::{GameCommand, GameHandle, GameState};
use howlr::models::{generate_keyword, Phase};
use howlr::spawn_game_session;
use howlr::token::NoTokenProvider;

const BOT_NAMES: &[&str] = &["Bob", "Carol", "Dan", "Erin", "Frank", "Grace", "Heidi"];

#[derive(Parser)]
#[command(name = "howlr", about = "Face-reveal werewolf over a live call (simulated round)")]
struct Cli {
    /// Number of simulated co-players
    #[arg(long, default_value = "3")]
    bots: usize,

    /// Room keyword (random if omitted)
    #[arg(long)]
    keyword: Option<String>,

    /// Simulated backend delivery delay in milliseconds
    #[arg(long, default_value = "10")]
    delay_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let keyword = cli.keyword.unwrap_or_else(generate_keyword);
    info!("Simulating a round in room {} with {} bots", keyword, cli.bots);

    let backend_tx = LocalRoomBackend::spawn(Some(Duration::from_millis(cli.delay_ms)));

    // The engine is a process-wide singleton, so only the narrated
    // player gets the loopback engine; the bots run call-less and
    // exercise the degraded path.
    let mut alice = spawn_game_session(
        GameConfig {
            call_duration: Some(Duration::from_secs(1)),
            ..GameConfig::default()
        },
        SessionConfig::full("howlr-demo"),
        Arc::new(NoTokenProvider),
        Arc::new(LoopbackFactory::default()),
        backend_tx.clone(),
    );
    let mut bots: Vec<GameHandle> = (0..cli.bots)
        .map(|_| {
            spawn_game_session(
                GameConfig {
                    call_duration: None,
                    ..GameConfig::default()
                },
                SessionConfig::new("howlr-demo"),
                Arc::new(NoTokenProvider),
                Arc::new(FailingFactory),
                backend_tx.clone(),
            )
        })
        .collect();

    send(&alice, GameCommand::Join {
        keyword: keyword.clone(),
        display_name: "Alice".into(),
    })
    .await;
    for (i, bot) in bots.iter().enumerate() {
        let name = bot_name(i);
        send(bot, GameCommand::Join {
            keyword: keyword.clone(),
            display_name: name,
        })
        .await;
    }

    wait_until(&mut alice, "everyone ready", |s| s.can_start).await;
    info!("Lobby full, starting the game");
    send(&alice, GameCommand::StartGame).await;

    wait_for_phase(&mut alice, Phase::RoleReveal).await;
    for bot in &mut bots {
        wait_for_phase(bot, Phase::RoleReveal).await;
    }

    // Alice's call countdown drives her into answer input; the bots
    // step through by intent. Nobody accuses until the whole table is
    // taking answers.
    send(&alice, GameCommand::StartCall).await;
    wait_for_phase(&mut alice, Phase::LiveCall).await;

    // Surfaces the UI would hand to the renderer: local preview plus
    // one per remote participant.
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    send(&alice, GameCommand::ProvisionSurfaces { reply: reply_tx }).await;
    if let Ok(surfaces) = reply_rx.await {
        info!("Provisioned {} render surfaces", surfaces.len());
    }

    for bot in &bots {
        send(bot, GameCommand::StartCall).await;
        send(bot, GameCommand::BeginAnswers).await;
    }
    for bot in &mut bots {
        wait_for_phase(bot, Phase::AnswerInput).await;
    }
    wait_for_phase(&mut alice, Phase::AnswerInput).await;
    info!("Call over, collecting accusations");

    for bot in &bots {
        let target = pick_target(&bot.state_rx.borrow());
        send(bot, GameCommand::SubmitAnswer { selected: target }).await;
    }
    let target = pick_target(&alice.state_rx.borrow());
    send(&alice, GameCommand::SubmitAnswer { selected: target }).await;

    wait_for_phase(&mut alice, Phase::AnswerReveal).await;
    let snapshot = alice.state_rx.borrow().clone();
    let wolf = snapshot
        .werewolf()
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| "?".into());
    let caught = snapshot.answers.iter().filter(|a| a.correct).count();
    info!(
        "Round over: {} was the werewolf, caught by {}/{} players",
        wolf,
        caught,
        snapshot.answers.len()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).expect("state serializes")
    );

    send(&alice, GameCommand::Restart).await;
    wait_for_phase(&mut alice, Phase::KeywordInput).await;
    info!("Reset complete");
}

fn bot_name(i: usize) -> String {
    let name = BOT_NAMES[i % BOT_NAMES.len()];
    if i < BOT_NAMES.len() {
        name.to_string()
    } else {
        format!("{}{}", name, i / BOT_NAMES.len() + 1)
    }
}

/// Accuse a random other participant.
fn pick_target(state: &GameState) -> String {
    let me = state.local.as_ref().map(|p| p.id.clone()).unwrap_or_default();
    let others: Vec<_> = state.roster.iter().filter(|p| p.id != me).collect();
    others
        .choose(&mut rand::thread_rng())
        .map(|p| p.id.clone())
        .expect("roster has other participants")
}

async fn send(handle: &GameHandle, cmd: GameCommand) {
    handle.command_tx.send(cmd).await.expect("session is running");
}

async fn wait_for_phase(handle: &mut GameHandle, want: Phase) {
    let label = format!("phase {:?}", want);
    wait_until(handle, &label, move |s| s.phase == want).await;
}

async fn wait_until(handle: &mut GameHandle, what: &str, pred: impl Fn(&GameState) -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if pred(&handle.state_rx.borrow()) {
                return;
            }
            if handle.state_rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}
