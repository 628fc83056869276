use serde::{Deserialize, Serialize};

// ============================================================
// Participants & Roles
// ============================================================

/// Room-scoped participant identity. Opaque, unique, immutable.
pub type ParticipantId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No role assigned yet (pre-game).
    Unset,
    Villager,
    Werewolf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub muted: bool,
    pub ready: bool,
    pub role: Role,
}

impl Participant {
    /// Create a fresh participant with a new identity and no role.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            muted: false,
            ready: false,
            role: Role::Unset,
        }
    }

    pub fn is_werewolf(&self) -> bool {
        self.role == Role::Werewolf
    }
}

/// Map a room-scoped participant id into the engine's numeric uid space.
///
/// The engine addresses participants by small numeric handles while the
/// backend addresses them by id string. Every component uses this one
/// mapping so a surface or mute command issued against a numeric handle
/// and a roster entry addressed by id resolve to the same participant.
/// Never returns 0: uid 0 is reserved for the local preview surface.
pub fn numeric_uid(id: &str) -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();
    let uid = (hash >> 32) as u32 ^ hash as u32;
    if uid == 0 { 1 } else { uid }
}

// ============================================================
// Answers
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Who answered.
    pub answerer: ParticipantId,
    /// Who they accused of being the werewolf.
    pub selected: ParticipantId,
    /// Fixed at creation from the round's werewolf id, never recomputed.
    pub correct: bool,
    pub submitted_at: String,
}

// ============================================================
// Game phase
// ============================================================

/// Local UI-facing step of the game flow. Distinct from the roster,
/// which is authoritative multi-participant state owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    KeywordInput,
    Lobby,
    RoleAssignmentPending,
    RoleReveal,
    LiveCall,
    AnswerInput,
    AnswerWaiting,
    AnswerReveal,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::KeywordInput
    }
}

// ============================================================
// Join keywords
// ============================================================

/// Generate a 4-character room join keyword from an unambiguous alphabet.
pub fn generate_keyword() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKMNPQRSTUVWXYZ23456789".chars().collect();
    (0..4)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}
