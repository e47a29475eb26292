// Progress events pushed to session subscribers
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Processing,
    Finalizing,
    Complete,
    Error,
    Cancelled,
}

impl Phase {
    /// Terminal phases always pass the throttle
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error | Phase::Cancelled)
    }
}

/// Failure taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Transport,
    Execution,
    ResultRead,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub request_id: String,
    pub phase: Phase,
    pub processed: u64,
    pub total: u64,
    pub percentage: f64,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
}

impl ProgressEvent {
    pub fn new(request_id: &str, phase: Phase, processed: u64, total: u64, percentage: f64) -> Self {
        Self {
            request_id: request_id.to_string(),
            phase,
            processed,
            total,
            percentage,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            error: None,
        }
    }

    pub fn with_error(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.error = Some(FailureInfo {
            kind,
            message: message.into(),
        });
        self
    }
}
