// Session lifecycle state machine
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Active,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    ChunkAccepted,
    FinalChunk,
    Finalized,
    Cancel,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: SessionEvent,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Whether the session may still take chunks
    pub fn accepts_chunks(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Active)
    }

    pub fn next(self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        use SessionEvent as E;
        use SessionState as S;
        let next = match (self, event) {
            (S::Idle | S::Active, E::ChunkAccepted) => S::Active,
            (S::Idle | S::Active, E::FinalChunk) => S::Finalizing,
            (S::Finalizing, E::Finalized) => S::Completed,
            (S::Idle | S::Active | S::Finalizing, E::Cancel) => S::Cancelled,
            (S::Idle | S::Active | S::Finalizing, E::Fail) => S::Failed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
