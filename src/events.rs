use serde::Serialize;
use tokio::sync::broadcast;

use crate::errors::EngineFault;
use crate::models::Phase;

/// Discrete session notifications for the UI layer. Continuous state
/// lives in the watch snapshot; these are the one-shot signals.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum GameEvent {
    PhaseChanged { phase: Phase },
    /// Real-time features are off for the rest of this session.
    CallUnavailable { reason: String },
    /// The engine confirmed the channel join.
    CallConnected { uid: u32 },
    CallDisconnected,
    BackendError { message: String },
    EngineFault { fault: EngineFault },
}

pub type EventSender = broadcast::Sender<GameEvent>;
pub type EventReceiver = broadcast::Receiver<GameEvent>;

pub fn create_event_bus() -> (EventSender, EventReceiver) {
    broadcast::channel(256)
}
