//! What a caller gets back from a coordinated write

use crate::intent::{IntentId, IntentStatus};
use thiserror::Error;

/// Successful write: both stores hold the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub status: IntentStatus,
    pub intent_id: IntentId,
}

/// A write that did not commit. Every variant that got as far as recording
/// an intent carries its id, so the caller can inspect or re-submit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    /// The secondary store refused the write and the primary was restored
    #[error("Write rolled back (intent {intent_id}): {reason}")]
    RolledBack { intent_id: IntentId, reason: String },

    /// The stores may disagree; the verifier owns convergence
    #[error("Stores diverged (intent {intent_id}): {reason}")]
    Divergent { intent_id: IntentId, reason: String },

    /// The caller's deadline passed; the intent stays where it got to
    #[error("Write timed out (intent {intent_id}, status {})", status_name(.status))]
    TimedOut {
        intent_id: IntentId,
        status: Option<IntentStatus>,
    },

    /// Rejected before any intent was recorded
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// The intent log itself failed
    #[error("Intent log error: {0}")]
    IntentLog(String),
}

fn status_name(status: &Option<IntentStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("NOT_RECORDED")
}

impl WriteError {
    /// Status the intent was left in, if one was recorded
    pub fn outcome(&self) -> Option<IntentStatus> {
        match self {
            WriteError::RolledBack { .. } => Some(IntentStatus::RolledBack),
            WriteError::Divergent { .. } => Some(IntentStatus::Divergent),
            WriteError::TimedOut { status, .. } => *status,
            WriteError::InvalidEntity(_) | WriteError::IntentLog(_) => None,
        }
    }

    pub fn intent_id(&self) -> Option<&IntentId> {
        match self {
            WriteError::RolledBack { intent_id, .. }
            | WriteError::Divergent { intent_id, .. }
            | WriteError::TimedOut { intent_id, .. } => Some(intent_id),
            WriteError::InvalidEntity(_) | WriteError::IntentLog(_) => None,
        }
    }
}

impl From<crate::intent::IntentError> for WriteError {
    fn from(e: crate::intent::IntentError) -> Self {
        WriteError::IntentLog(e.to_string())
    }
}
