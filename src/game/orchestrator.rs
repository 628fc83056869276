use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{RoomCommand, RoomEvent};
use crate::config::GameConfig;
use crate::engine::coordinator::EngineEvent;
use crate::engine::facade::{EngineSession, SessionConfig};
use crate::engine::{ClientRole, EngineFactory};
use crate::events::{EventSender, GameEvent};
use crate::models::{numeric_uid, Participant, Phase};
use crate::token::TokenProvider;

use super::{roster, GameCommand, GameState};

/// Collaborators needed to bring the call up when a room is joined.
pub struct CallDeps {
    pub config: SessionConfig,
    pub tokens: Arc<dyn TokenProvider>,
    pub factory: Arc<dyn EngineFactory>,
}

/// Run the game session event loop.
///
/// This task is the single writer of the local game state. UI intents,
/// backend events and engine events all land in this one loop and are
/// applied one at a time; nothing else mutates the roster, the answers
/// or the phase.
pub async fn run_game_session(
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    cmd_tx: mpsc::Sender<GameCommand>,
    backend_tx: mpsc::Sender<RoomCommand>,
    event_tx: EventSender,
    state_tx: watch::Sender<GameState>,
    call: CallDeps,
    config: GameConfig,
) {
    info!("Game session started");

    // Session-scoped state. Everything here is dropped wholesale when
    // the room is left or the round resets.
    let mut phase = Phase::KeywordInput;
    let mut keyword: Option<String> = None;
    let mut local: Option<Participant> = None;
    let mut roster: Vec<Participant> = Vec::new();
    let mut answers = Vec::new();
    let mut muted = false;
    let mut ready_ack_sent = false;

    // Live-call resources (kept alive while the room is joined).
    let mut engine_session: Option<EngineSession> = None;
    let mut call_available = false;
    let mut call_connected = false;
    let mut join_task: Option<JoinHandle<()>> = None;
    let mut call_timer: Option<JoinHandle<()>> = None;

    // Per-session event streams, created on join.
    let mut room_rx: Option<mpsc::Receiver<RoomEvent>> = None;
    let mut engine_rx: Option<mpsc::Receiver<EngineEvent>> = None;

    macro_rules! publish_state {
        () => {{
            let can_start = phase == Phase::Lobby
                && roster.len() >= config.min_players
                && roster::all_ready(&roster);
            let _ = state_tx.send(GameState {
                phase,
                keyword: keyword.clone(),
                local: local.clone(),
                roster: roster.clone(),
                answers: answers.clone(),
                muted,
                call_available,
                call_connected,
                can_start,
            });
        }};
    }

    macro_rules! set_phase {
        ($p:expr) => {{
            if phase != $p {
                phase = $p;
                let _ = event_tx.send(GameEvent::PhaseChanged { phase });
            }
            publish_state!();
        }};
    }

    // Cancel in-flight work and drop every piece of session state.
    macro_rules! reset_session {
        () => {{
            if let Some(handle) = join_task.take() {
                handle.abort();
            }
            if let Some(handle) = call_timer.take() {
                handle.abort();
            }
            if let Some(session) = engine_session.take() {
                session.teardown();
            }
            engine_rx = None;
            room_rx = None;
            roster.clear();
            answers.clear();
            keyword = None;
            local = None;
            muted = false;
            ready_ack_sent = false;
            call_available = false;
            call_connected = false;
        }};
    }

    publish_state!();

    loop {
        tokio::select! {
            maybe_cmd = cmd_rx.recv() => {
                let Some(cmd) = maybe_cmd else { break };
                match cmd {
                    GameCommand::Join { keyword: kw, display_name } => {
                        if phase != Phase::KeywordInput {
                            warn!("Join ignored in phase {:?}", phase);
                            continue;
                        }
                        let kw = kw.trim().to_string();
                        let name = display_name.trim().to_string();
                        if kw.is_empty() || name.is_empty() {
                            warn!("Join ignored: keyword and display name required");
                            continue;
                        }

                        let me = Participant::new(name);
                        info!("Joining room {} as {}", kw, me.display_name);
                        local = Some(me.clone());
                        roster.clear();
                        roster.push(me.clone());
                        answers.clear();
                        muted = false;
                        ready_ack_sent = false;
                        keyword = Some(kw.clone());
                        set_phase!(Phase::Lobby);

                        // Bring the call up. A failed build means the game
                        // continues without real-time features.
                        let (engine_event_tx, engine_event_rx) = mpsc::channel(64);
                        match EngineSession::connect(
                            call.config.clone(),
                            call.tokens.clone(),
                            call.factory.as_ref(),
                            engine_event_tx,
                        ) {
                            Ok(session) => {
                                engine_rx = Some(engine_event_rx);
                                call_available = true;

                                // At most one join in flight per session.
                                if let Some(handle) = join_task.take() {
                                    handle.abort();
                                }
                                let channel = session.channel.clone();
                                let channel_name = kw.clone();
                                let uid = numeric_uid(&me.id);
                                let events = event_tx.clone();
                                join_task = Some(tokio::spawn(async move {
                                    if let Err(e) = channel
                                        .join_channel(&channel_name, uid, ClientRole::Broadcaster)
                                        .await
                                    {
                                        warn!("Channel join failed: {}", e);
                                        let _ = events.send(GameEvent::CallUnavailable {
                                            reason: e.to_string(),
                                        });
                                    }
                                }));
                                engine_session = Some(session);
                            }
                            Err(e) => {
                                warn!("Engine build failed, continuing without call: {}", e);
                                call_available = false;
                                let _ = event_tx.send(GameEvent::CallUnavailable {
                                    reason: e.to_string(),
                                });
                            }
                        }

                        let (room_event_tx, room_event_rx) = mpsc::channel(64);
                        room_rx = Some(room_event_rx);
                        let _ = backend_tx
                            .send(RoomCommand::JoinRoom {
                                keyword: kw,
                                participant: me,
                                events: room_event_tx,
                            })
                            .await;
                        publish_state!();
                    }

                    GameCommand::StartGame => {
                        if phase != Phase::Lobby {
                            warn!("Start ignored in phase {:?}", phase);
                            continue;
                        }
                        if roster.len() < config.min_players || !roster::all_ready(&roster) {
                            warn!(
                                "Start rejected: need {} ready players, have {}",
                                config.min_players,
                                roster.iter().filter(|p| p.ready).count()
                            );
                            continue;
                        }
                        set_phase!(Phase::RoleAssignmentPending);
                        if let Some(kw) = &keyword {
                            let _ = backend_tx
                                .send(RoomCommand::StartGame { keyword: kw.clone() })
                                .await;
                        }
                    }

                    GameCommand::StartCall => {
                        if phase != Phase::RoleReveal {
                            warn!("Start-call ignored in phase {:?}", phase);
                            continue;
                        }
                        set_phase!(Phase::LiveCall);
                        if let Some(session) = &engine_session {
                            if let Some(video) = &session.video {
                                if let Err(e) = video.enable_camera() {
                                    warn!("Camera enable failed: {}", e);
                                }
                            }
                        }
                        if let Some(duration) = config.call_duration {
                            if let Some(handle) = call_timer.take() {
                                handle.abort();
                            }
                            let tx = cmd_tx.clone();
                            call_timer = Some(tokio::spawn(async move {
                                tokio::time::sleep(duration).await;
                                let _ = tx.send(GameCommand::BeginAnswers).await;
                            }));
                        }
                    }

                    GameCommand::BeginAnswers => {
                        if phase != Phase::LiveCall {
                            debug!("Answer-input intent ignored in phase {:?}", phase);
                            continue;
                        }
                        if let Some(handle) = call_timer.take() {
                            handle.abort();
                        }
                        if let Some(session) = &engine_session {
                            if let Some(video) = &session.video {
                                let _ = video.disable_camera();
                            }
                        }
                        set_phase!(Phase::AnswerInput);
                    }

                    GameCommand::SubmitAnswer { selected } => {
                        if phase != Phase::AnswerInput {
                            warn!("Answer ignored in phase {:?}", phase);
                            continue;
                        }
                        let (Some(me), Some(kw)) = (local.as_ref(), keyword.as_ref()) else {
                            continue;
                        };
                        let _ = backend_tx
                            .send(RoomCommand::SubmitAnswer {
                                keyword: kw.clone(),
                                answerer: me.id.clone(),
                                selected,
                            })
                            .await;
                        set_phase!(Phase::AnswerWaiting);
                    }

                    GameCommand::SetMuted(m) => {
                        let Some(me) = local.as_mut() else { continue };
                        // Optimistic: apply locally first, re-send to the
                        // backend, and let its authoritative upsert settle
                        // the field later.
                        muted = m;
                        me.muted = m;
                        let id = me.id.clone();
                        roster::upsert(&mut roster, me.clone());
                        if let Some(session) = &engine_session {
                            if let Some(audio) = &session.audio {
                                let result = if m { audio.mute() } else { audio.unmute() };
                                if let Err(e) = result {
                                    warn!("Mute toggle failed: {}", e);
                                }
                            }
                        }
                        if let Some(kw) = &keyword {
                            let _ = backend_tx
                                .send(RoomCommand::SetMuted {
                                    keyword: kw.clone(),
                                    participant_id: id,
                                    muted: m,
                                })
                                .await;
                        }
                        publish_state!();
                    }

                    GameCommand::ProvisionSurfaces { reply } => {
                        // One mapping scheme everywhere: remote surfaces
                        // are keyed by the same numeric uid the engine
                        // reports for that participant.
                        let mut surfaces = Vec::new();
                        if let (Some(session), Some(me)) = (&engine_session, &local) {
                            if let Some(video) = &session.video {
                                match video.local_surface() {
                                    Ok(surface) => surfaces.push((me.id.clone(), surface)),
                                    Err(e) => warn!("Local surface failed: {}", e),
                                }
                                for peer in roster.iter().filter(|p| p.id != me.id) {
                                    match video.remote_surface(numeric_uid(&peer.id)) {
                                        Ok(surface) => surfaces.push((peer.id.clone(), surface)),
                                        Err(e) => warn!(
                                            "Surface for {} failed: {}",
                                            peer.display_name, e
                                        ),
                                    }
                                }
                            }
                        }
                        let _ = reply.send(surfaces);
                    }

                    GameCommand::Restart => {
                        if phase != Phase::AnswerReveal {
                            warn!("Restart ignored in phase {:?}", phase);
                            continue;
                        }
                        if let Some(kw) = &keyword {
                            let _ = backend_tx
                                .send(RoomCommand::ResetGame { keyword: kw.clone() })
                                .await;
                        }
                        info!("Round reset");
                        reset_session!();
                        set_phase!(Phase::KeywordInput);
                    }

                    GameCommand::LeaveRoom => {
                        if let (Some(me), Some(kw)) = (local.as_ref(), keyword.as_ref()) {
                            info!("Leaving room {}", kw);
                            let _ = backend_tx
                                .send(RoomCommand::LeaveRoom {
                                    keyword: kw.clone(),
                                    participant_id: me.id.clone(),
                                })
                                .await;
                        }
                        reset_session!();
                        set_phase!(Phase::KeywordInput);
                    }
                }
            }

            maybe_event = async {
                match room_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                let Some(event) = maybe_event else {
                    debug!("Backend event stream closed");
                    room_rx = None;
                    continue;
                };
                match event {
                    RoomEvent::ChannelJoined { id } => {
                        if !local.as_ref().is_some_and(|me| me.id == id) {
                            continue;
                        }
                        if let Some(me) = local.as_mut() {
                            me.ready = true;
                            roster::upsert(&mut roster, me.clone());
                        }
                        // One-shot per session: join echoes can race the
                        // roster events and be delivered again.
                        if !ready_ack_sent {
                            ready_ack_sent = true;
                            if let Some(kw) = &keyword {
                                let _ = backend_tx
                                    .send(RoomCommand::AcknowledgeReady {
                                        keyword: kw.clone(),
                                        participant_id: id,
                                    })
                                    .await;
                            }
                        }
                        publish_state!();
                    }

                    RoomEvent::ParticipantUpserted { participant } => {
                        // The backend's copy replaces the whole entry,
                        // including fields an optimistic update already
                        // set. Nothing is re-sent from here.
                        if local.as_ref().is_some_and(|me| me.id == participant.id) {
                            muted = participant.muted;
                            local = Some(participant.clone());
                        }
                        roster::upsert(&mut roster, participant);
                        publish_state!();
                    }

                    RoomEvent::ParticipantLeft { id } => {
                        roster::remove(&mut roster, &id);
                        publish_state!();
                    }

                    RoomEvent::GameStarted => {
                        if matches!(phase, Phase::Lobby | Phase::RoleAssignmentPending) {
                            set_phase!(Phase::RoleAssignmentPending);
                        }
                    }

                    RoomEvent::RolesAssigned { roster: assigned } => {
                        // The server roster replaces the local snapshot
                        // wholesale, our own entry included.
                        let my_id = local.as_ref().map(|me| me.id.clone());
                        if let Some(my_id) = my_id {
                            if let Some(mine) = assigned.iter().find(|p| p.id == my_id) {
                                local = Some(mine.clone());
                            }
                        }
                        roster = assigned;
                        if phase == Phase::RoleAssignmentPending {
                            set_phase!(Phase::RoleReveal);
                        } else {
                            publish_state!();
                        }
                    }

                    RoomEvent::AnswerSubmitted { answer } => {
                        if !matches!(phase, Phase::AnswerInput | Phase::AnswerWaiting) {
                            continue;
                        }
                        if roster::record_answer(&mut answers, answer) {
                            debug!("Answers {}/{}", answers.len(), roster.len());
                        }
                        if phase == Phase::AnswerWaiting && answers.len() == roster.len() {
                            set_phase!(Phase::AnswerReveal);
                        } else {
                            publish_state!();
                        }
                    }

                    RoomEvent::Error { message } => {
                        warn!("Backend error: {}", message);
                        let _ = event_tx.send(GameEvent::BackendError { message });
                    }
                }
            }

            maybe_event = async {
                match engine_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                let Some(event) = maybe_event else {
                    debug!("Engine event stream closed");
                    engine_rx = None;
                    continue;
                };
                match event {
                    EngineEvent::ChannelJoined { uid } => {
                        call_connected = true;
                        let _ = event_tx.send(GameEvent::CallConnected { uid });
                        publish_state!();
                    }

                    EngineEvent::PeerJoined { uid } => {
                        match roster.iter().find(|p| numeric_uid(&p.id) == uid) {
                            Some(peer) => debug!("{} is on the call", peer.display_name),
                            None => debug!("Unknown uid {} on the call", uid),
                        }
                    }

                    EngineEvent::PeerLeft { uid, reason } => {
                        debug!("Uid {} left the call ({:?})", uid, reason);
                    }

                    EngineEvent::ChannelLeft => {
                        call_connected = false;
                        let _ = event_tx.send(GameEvent::CallDisconnected);
                        publish_state!();
                    }

                    EngineEvent::Fault(fault) => {
                        let _ = event_tx.send(GameEvent::EngineFault { fault });
                        if fault.is_fatal() {
                            // The call is gone for this session; the game
                            // itself carries on through the backend.
                            warn!("Fatal engine fault, dropping call: {}", fault);
                            if let Some(handle) = join_task.take() {
                                handle.abort();
                            }
                            if let Some(session) = engine_session.take() {
                                session.teardown();
                            }
                            call_available = false;
                            call_connected = false;
                            let _ = event_tx.send(GameEvent::CallUnavailable {
                                reason: fault.to_string(),
                            });
                            publish_state!();
                        }
                    }
                }
            }
        }
    }

    if let Some(handle) = join_task.take() {
        handle.abort();
    }
    if let Some(handle) = call_timer.take() {
        handle.abort();
    }
    if let Some(session) = engine_session.take() {
        session.teardown();
    }
    debug!("Game session loop exiting");
}
