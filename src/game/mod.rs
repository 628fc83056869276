pub mod orchestrator;
pub mod roster;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use crate::engine::RenderSurface;
use crate::events::EventSender;
use crate::models::{Answer, Participant, ParticipantId, Phase};

/// Local intents sent into the session orchestrator from the UI layer.
#[derive(Debug)]
pub enum GameCommand {
    /// Join a room by keyword. Only valid from the keyword-input phase.
    Join {
        keyword: String,
        display_name: String,
    },
    StartGame,
    /// Move from role reveal into the live call.
    StartCall,
    /// End the call phase and open answer input. Also emitted by the
    /// call countdown when it elapses.
    BeginAnswers,
    SubmitAnswer {
        selected: ParticipantId,
    },
    SetMuted(bool),
    /// Allocate render surfaces for the current roster: the local
    /// preview plus one remote surface per other participant, each
    /// paired with the participant it renders. Empty when the session
    /// has no video capability.
    ProvisionSurfaces {
        reply: oneshot::Sender<Vec<(ParticipantId, RenderSurface)>>,
    },
    /// Start a new round from the answer reveal.
    Restart,
    LeaveRoom,
}

/// Observable snapshot of the local participant's view of the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    pub keyword: Option<String>,
    pub local: Option<Participant>,
    pub roster: Vec<Participant>,
    pub answers: Vec<Answer>,
    pub muted: bool,
    /// Whether the engine session was built for this room.
    pub call_available: bool,
    /// Whether the engine has confirmed the channel join.
    pub call_connected: bool,
    /// Whether the start-game intent would currently be accepted.
    pub can_start: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: Phase::KeywordInput,
            keyword: None,
            local: None,
            roster: Vec::new(),
            answers: Vec::new(),
            muted: false,
            call_available: false,
            call_connected: false,
            can_start: false,
        }
    }
}

impl GameState {
    /// The participant holding the werewolf role, once assigned.
    pub fn werewolf(&self) -> Option<&Participant> {
        self.roster.iter().find(|p| p.is_werewolf())
    }
}

/// Handle for driving and observing one game session.
#[derive(Clone)]
pub struct GameHandle {
    pub command_tx: mpsc::Sender<GameCommand>,
    pub state_rx: watch::Receiver<GameState>,
    pub event_tx: EventSender,
}
