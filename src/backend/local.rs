//! In-process room backend.
//!
//! One task owns every room, keyed by join keyword: rooms are created
//! on first join and destroyed when the last participant leaves or the
//! round is reset. This is the authoritative side of the game state:
//! it picks exactly one werewolf at role assignment and fixes answer
//! correctness at creation. An optional delivery delay approximates a
//! networked backend.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{Answer, Participant, ParticipantId, Role};

use super::{RoomCommand, RoomEvent};

pub struct LocalRoomBackend;

impl LocalRoomBackend {
    /// Spawn the backend task. The returned sender is shared by every
    /// client session in the process.
    pub fn spawn(delivery_delay: Option<Duration>) -> mpsc::Sender<RoomCommand> {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        tokio::spawn(run_backend(cmd_rx, delivery_delay));
        cmd_tx
    }
}

struct Room {
    created_at: String,
    members: Vec<Participant>,
    /// Ordered per-client delivery queues; see `client_queue`.
    clients: HashMap<ParticipantId, mpsc::UnboundedSender<RoomEvent>>,
    answers: Vec<Answer>,
    werewolf: Option<ParticipantId>,
    started: bool,
}

impl Room {
    fn new() -> Self {
        Self {
            created_at: Utc::now().to_rfc3339(),
            members: Vec::new(),
            clients: HashMap::new(),
            answers: Vec::new(),
            werewolf: None,
            started: false,
        }
    }

    fn member_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.members.iter_mut().find(|p| p.id == id)
    }
}

async fn run_backend(mut cmd_rx: mpsc::Receiver<RoomCommand>, delay: Option<Duration>) {
    info!("Local room backend started");
    let mut rooms: HashMap<String, Room> = HashMap::new();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RoomCommand::JoinRoom {
                keyword,
                participant,
                events,
            } => {
                let room = rooms.entry(keyword.clone()).or_insert_with(|| {
                    info!("Room {} created", keyword);
                    Room::new()
                });
                debug!(
                    "{} joins room {} (created {})",
                    participant.display_name, keyword, room.created_at
                );
                let queue = client_queue(events, delay);

                // The newcomer learns the current roster first.
                for member in &room.members {
                    let _ = queue.send(RoomEvent::ParticipantUpserted {
                        participant: member.clone(),
                    });
                }

                let id = participant.id.clone();
                match room.member_mut(&id) {
                    Some(existing) => *existing = participant.clone(),
                    None => room.members.push(participant.clone()),
                }
                room.clients.insert(id.clone(), queue.clone());

                broadcast(room, RoomEvent::ParticipantUpserted { participant });
                let _ = queue.send(RoomEvent::ChannelJoined { id });
            }

            RoomCommand::LeaveRoom {
                keyword,
                participant_id,
            } => {
                let Some(room) = rooms.get_mut(&keyword) else {
                    continue;
                };
                room.members.retain(|p| p.id != participant_id);
                room.clients.remove(&participant_id);
                broadcast(
                    room,
                    RoomEvent::ParticipantLeft {
                        id: participant_id,
                    },
                );
                if room.members.is_empty() {
                    rooms.remove(&keyword);
                    info!("Room {} destroyed (last participant left)", keyword);
                }
            }

            RoomCommand::AcknowledgeReady {
                keyword,
                participant_id,
            } => {
                let Some(room) = rooms.get_mut(&keyword) else {
                    warn!("Ready ack for unknown room {}", keyword);
                    continue;
                };
                let Some(member) = room.member_mut(&participant_id) else {
                    report(room, &participant_id, "ready ack from non-member");
                    continue;
                };
                member.ready = true;
                let participant = member.clone();
                broadcast(room, RoomEvent::ParticipantUpserted { participant });
            }

            RoomCommand::SetMuted {
                keyword,
                participant_id,
                muted,
            } => {
                let Some(room) = rooms.get_mut(&keyword) else {
                    continue;
                };
                let Some(member) = room.member_mut(&participant_id) else {
                    continue;
                };
                member.muted = muted;
                let participant = member.clone();
                broadcast(room, RoomEvent::ParticipantUpserted { participant });
            }

            RoomCommand::StartGame { keyword } => {
                let Some(room) = rooms.get_mut(&keyword) else {
                    continue;
                };
                if room.started {
                    // Safe to re-deliver; clients treat it as a no-op.
                    broadcast(room, RoomEvent::GameStarted);
                    continue;
                }
                if room.members.is_empty() {
                    continue;
                }
                room.started = true;
                broadcast(room, RoomEvent::GameStarted);

                let wolf_index = rand::thread_rng().gen_range(0..room.members.len());
                for (i, member) in room.members.iter_mut().enumerate() {
                    member.role = if i == wolf_index {
                        Role::Werewolf
                    } else {
                        Role::Villager
                    };
                }
                room.werewolf = Some(room.members[wolf_index].id.clone());
                info!(
                    "Room {} started, werewolf is {}",
                    keyword, room.members[wolf_index].display_name
                );
                let roster = room.members.clone();
                broadcast(room, RoomEvent::RolesAssigned { roster });
            }

            RoomCommand::SubmitAnswer {
                keyword,
                answerer,
                selected,
            } => {
                let Some(room) = rooms.get_mut(&keyword) else {
                    continue;
                };
                let Some(wolf) = room.werewolf.clone() else {
                    report(room, &answerer, "answer before roles were assigned");
                    continue;
                };
                // One answer per answerer per round; re-deliver the
                // original on duplicates.
                let answer = match room.answers.iter().find(|a| a.answerer == answerer) {
                    Some(existing) => existing.clone(),
                    None => {
                        let answer = Answer {
                            answerer: answerer.clone(),
                            correct: selected == wolf,
                            selected,
                            submitted_at: Utc::now().to_rfc3339(),
                        };
                        room.answers.push(answer.clone());
                        answer
                    }
                };
                broadcast(room, RoomEvent::AnswerSubmitted { answer });
            }

            RoomCommand::ResetGame { keyword } => {
                // No participant data survives a reset: drop the room
                // and every client's event stream with it.
                if rooms.remove(&keyword).is_some() {
                    info!("Room {} destroyed (round reset)", keyword);
                }
            }
        }
    }
    debug!("Local room backend exiting");
}

/// Start the ordered delivery queue for one client.
///
/// Events queue without blocking the backend loop and reach the client
/// in exactly the order they were produced; the simulated delay is
/// applied inside the forwarder so it cannot reorder anything. Dropping
/// the queue sender (room destroyed) drains and closes the client's
/// stream.
fn client_queue(
    events: mpsc::Sender<RoomEvent>,
    delay: Option<Duration>,
) -> mpsc::UnboundedSender<RoomEvent> {
    let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<RoomEvent>();
    tokio::spawn(async move {
        while let Some(event) = queue_rx.recv().await {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if events.send(event).await.is_err() {
                break;
            }
        }
    });
    queue_tx
}

fn broadcast(room: &Room, event: RoomEvent) {
    for client in room.clients.values() {
        let _ = client.send(event.clone());
    }
}

/// Surface a command problem to the client that caused it, when known.
fn report(room: &Room, participant_id: &str, message: &str) {
    warn!("{} ({})", message, participant_id);
    if let Some(client) = room.clients.get(participant_id) {
        let _ = client.send(RoomEvent::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    async fn recv(rx: &mut mpsc::Receiver<RoomEvent>) -> RoomEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for room event")
            .expect("event stream closed")
    }

    async fn join(
        backend: &mpsc::Sender<RoomCommand>,
        keyword: &str,
        name: &str,
    ) -> (Participant, mpsc::Receiver<RoomEvent>) {
        let participant = Participant::new(name);
        let (tx, rx) = mpsc::channel(64);
        backend
            .send(RoomCommand::JoinRoom {
                keyword: keyword.into(),
                participant: participant.clone(),
                events: tx,
            })
            .await
            .unwrap();
        (participant, rx)
    }

    #[tokio::test]
    async fn join_is_echoed_after_the_roster() {
        let backend = LocalRoomBackend::spawn(None);
        let (alice, mut rx) = join(&backend, "ABCD", "Alice").await;

        assert_eq!(
            recv(&mut rx).await,
            RoomEvent::ParticipantUpserted {
                participant: alice.clone()
            }
        );
        assert_eq!(recv(&mut rx).await, RoomEvent::ChannelJoined { id: alice.id });
    }

    #[tokio::test]
    async fn newcomer_learns_existing_members_first() {
        let backend = LocalRoomBackend::spawn(None);
        let (alice, _alice_rx) = join(&backend, "ABCD", "Alice").await;
        let (bob, mut bob_rx) = join(&backend, "ABCD", "Bob").await;

        assert_eq!(
            recv(&mut bob_rx).await,
            RoomEvent::ParticipantUpserted { participant: alice }
        );
        assert_eq!(
            recv(&mut bob_rx).await,
            RoomEvent::ParticipantUpserted {
                participant: bob.clone()
            }
        );
        assert_eq!(recv(&mut bob_rx).await, RoomEvent::ChannelJoined { id: bob.id });
    }

    #[tokio::test]
    async fn start_game_assigns_exactly_one_werewolf() {
        let backend = LocalRoomBackend::spawn(None);
        let (_alice, mut rx) = join(&backend, "WXYZ", "Alice").await;
        let (_bob, _rx_b) = join(&backend, "WXYZ", "Bob").await;
        let (_carol, _rx_c) = join(&backend, "WXYZ", "Carol").await;

        backend
            .send(RoomCommand::StartGame {
                keyword: "WXYZ".into(),
            })
            .await
            .unwrap();

        let roster = loop {
            match recv(&mut rx).await {
                RoomEvent::RolesAssigned { roster } => break roster,
                _ => continue,
            }
        };
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.iter().filter(|p| p.is_werewolf()).count(), 1);
        assert!(roster
            .iter()
            .all(|p| matches!(p.role, Role::Werewolf | Role::Villager)));
    }

    #[tokio::test]
    async fn answer_correctness_is_fixed_against_the_werewolf() {
        let backend = LocalRoomBackend::spawn(None);
        let (alice, mut rx) = join(&backend, "GAME", "Alice").await;
        let (_bob, _rx_b) = join(&backend, "GAME", "Bob").await;

        backend
            .send(RoomCommand::StartGame {
                keyword: "GAME".into(),
            })
            .await
            .unwrap();
        let roster = loop {
            match recv(&mut rx).await {
                RoomEvent::RolesAssigned { roster } => break roster,
                _ => continue,
            }
        };
        let wolf = roster.iter().find(|p| p.is_werewolf()).unwrap();

        backend
            .send(RoomCommand::SubmitAnswer {
                keyword: "GAME".into(),
                answerer: alice.id.clone(),
                selected: wolf.id.clone(),
            })
            .await
            .unwrap();

        let answer = loop {
            match recv(&mut rx).await {
                RoomEvent::AnswerSubmitted { answer } => break answer,
                _ => continue,
            }
        };
        assert!(answer.correct);
        assert_eq!(answer.answerer, alice.id);
    }

    #[tokio::test]
    async fn duplicate_answers_redeliver_the_original() {
        let backend = LocalRoomBackend::spawn(None);
        let (alice, mut rx) = join(&backend, "DUPE", "Alice").await;
        let (bob, _rx_b) = join(&backend, "DUPE", "Bob").await;

        backend
            .send(RoomCommand::StartGame {
                keyword: "DUPE".into(),
            })
            .await
            .unwrap();
        loop {
            if let RoomEvent::RolesAssigned { .. } = recv(&mut rx).await {
                break;
            }
        }

        for _ in 0..2 {
            backend
                .send(RoomCommand::SubmitAnswer {
                    keyword: "DUPE".into(),
                    answerer: alice.id.clone(),
                    selected: bob.id.clone(),
                })
                .await
                .unwrap();
        }

        let first = loop {
            match recv(&mut rx).await {
                RoomEvent::AnswerSubmitted { answer } => break answer,
                _ => continue,
            }
        };
        let second = loop {
            match recv(&mut rx).await {
                RoomEvent::AnswerSubmitted { answer } => break answer,
                _ => continue,
            }
        };
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reset_destroys_the_room_and_closes_streams() {
        let backend = LocalRoomBackend::spawn(None);
        let (alice, mut rx) = join(&backend, "RSET", "Alice").await;
        loop {
            if let RoomEvent::ChannelJoined { .. } = recv(&mut rx).await {
                break;
            }
        }

        backend
            .send(RoomCommand::ResetGame {
                keyword: "RSET".into(),
            })
            .await
            .unwrap();

        // Stream closes once the room is gone.
        assert_eq!(
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            None
        );

        // A fresh join with the same keyword starts from an empty roster.
        let (rejoined, mut rx2) = join(&backend, "RSET", "Alice-2").await;
        assert_eq!(
            recv(&mut rx2).await,
            RoomEvent::ParticipantUpserted {
                participant: rejoined.clone()
            }
        );
        assert_eq!(
            recv(&mut rx2).await,
            RoomEvent::ChannelJoined { id: rejoined.id }
        );
        let _ = alice;
    }
}
