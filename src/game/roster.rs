//! Roster and answer bookkeeping.
//!
//! The roster is addressed by participant id, never by position; the
//! `Vec` backing only preserves join order for display. Backend events
//! replace whole entries (last writer is the backend).

use crate::models::{Answer, Participant};

/// Insert or replace the entry with the same id.
pub fn upsert(roster: &mut Vec<Participant>, participant: Participant) {
    match roster.iter_mut().find(|p| p.id == participant.id) {
        Some(slot) => *slot = participant,
        None => roster.push(participant),
    }
}

/// Remove exactly the entry with the given id, leaving others untouched.
pub fn remove(roster: &mut Vec<Participant>, id: &str) {
    roster.retain(|p| p.id != id);
}

pub fn all_ready(roster: &[Participant]) -> bool {
    roster.iter().all(|p| p.ready)
}

/// Append unless this answerer already has an answer this round.
/// Returns whether the answer was recorded.
pub fn record_answer(answers: &mut Vec<Answer>, answer: Answer) -> bool {
    if answers.iter().any(|a| a.answerer == answer.answerer) {
        return false;
    }
    answers.push(answer);
    true
}
