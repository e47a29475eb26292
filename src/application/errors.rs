// Error taxonomy for sessions and execution units
use crate::domain::progress::ErrorKind;
use crate::domain::session::SessionState;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Malformed or out-of-order input. Aborts the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chunk {got} arrived out of order, expected {expected}")]
    OutOfOrder { expected: u32, got: u32 },

    #[error("chunk {sequence} exceeds declared total of {total_chunks}")]
    BeyondTotal { sequence: u32, total_chunks: u32 },

    #[error("final chunk {sequence} carries no points")]
    EmptyFinalChunk { sequence: u32 },

    #[error("chunk {sequence} declares {declared} points but carries {actual}")]
    PointCountMismatch {
        sequence: u32,
        declared: u32,
        actual: usize,
    },

    #[error("every point in chunk {sequence} is malformed ({invalid} points)")]
    AllPointsMalformed { sequence: u32, invalid: usize },

    #[error("session no longer accepts chunks (state: {0})")]
    SessionClosed(SessionState),
}

/// The execution unit could not run or stopped unexpectedly
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn worker {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker exited with status {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("worker thread panicked: {0}")]
    Panicked(String),

    #[error("worker protocol violation: {0}")]
    Protocol(String),

    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Worker reported success but its output could not be read
#[derive(Debug, Error)]
pub enum ResultReadError {
    #[error("result artifact {0:?} is missing")]
    Missing(PathBuf),

    #[error("result artifact {path:?} is unreadable: {reason}")]
    Unparseable { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    ResultRead(#[from] ResultReadError),

    #[error("session {0} was cancelled")]
    Cancelled(String),

    #[error("session aborted: {0}")]
    Aborted(String),

    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} already exists")]
    AlreadyExists(String),

    #[error("session {0} already has a subscriber")]
    AlreadySubscribed(String),

    #[error("session {id} has no result yet (state: {state})")]
    NotReady { id: String, state: SessionState },
}

impl SessionError {
    /// Taxonomy kind reported to callers. Lookup errors count as transport.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Transport(_)
            | SessionError::Aborted(_)
            | SessionError::NotFound(_)
            | SessionError::AlreadyExists(_)
            | SessionError::AlreadySubscribed(_)
            | SessionError::NotReady { .. } => ErrorKind::Transport,
            SessionError::Execution(_) => ErrorKind::Execution,
            SessionError::ResultRead(_) => ErrorKind::ResultRead,
            SessionError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub fn log_error(&self, request_id: &str) {
        match self {
            SessionError::Cancelled(_) => {
                debug!(request_id, "Session cancelled");
            }
            SessionError::NotFound(_)
            | SessionError::AlreadyExists(_)
            | SessionError::AlreadySubscribed(_)
            | SessionError::NotReady { .. } => {
                warn!(request_id, error = %self, "Session lookup failed");
            }
            other => {
                error!(request_id, kind = ?other.kind(), error = %other, "Session failed");
                debug!(request_id, "Session error details: {:?}", other);
            }
        }
    }
}
