//! Game-backend wire contract.
//!
//! Commands are fire-and-forget: the only acknowledgment is the paired
//! event arriving later on the client's event stream, and every event
//! is safe to re-deliver.

pub mod local;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{Answer, Participant, ParticipantId};

/// Commands sent from a session to the room backend.
#[derive(Debug)]
pub enum RoomCommand {
    /// Join (creating the room on first use). Carries the sender the
    /// backend will deliver this client's events on.
    JoinRoom {
        keyword: String,
        participant: Participant,
        events: mpsc::Sender<RoomEvent>,
    },
    LeaveRoom {
        keyword: String,
        participant_id: ParticipantId,
    },
    AcknowledgeReady {
        keyword: String,
        participant_id: ParticipantId,
    },
    SetMuted {
        keyword: String,
        participant_id: ParticipantId,
        muted: bool,
    },
    StartGame {
        keyword: String,
    },
    SubmitAnswer {
        keyword: String,
        answerer: ParticipantId,
        selected: ParticipantId,
    },
    ResetGame {
        keyword: String,
    },
}

/// Events delivered to each client in a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum RoomEvent {
    /// Echo confirming this client's own join reached the room.
    ChannelJoined { id: ParticipantId },
    /// A participant joined or changed ready/mute state. Replaces the
    /// whole roster entry for that id.
    ParticipantUpserted { participant: Participant },
    ParticipantLeft { id: ParticipantId },
    GameStarted,
    /// Full authoritative roster with roles filled in.
    RolesAssigned { roster: Vec<Participant> },
    AnswerSubmitted { answer: Answer },
    Error { message: String },
}
