use crate::model::{SessionId, SessionStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the registry refused a `join_room`. Sent on the wire; reveals nothing about the room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAParticipant,
    SessionNotFound,
    SessionClosed,
    IdentityMismatch,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NotAParticipant => "not a participant of this session",
            DenyReason::SessionNotFound => "session not found",
            DenyReason::SessionClosed => "session is closed",
            DenyReason::IdentityMismatch => "connection is bound to another user",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DuetError {
    #[error("authorization failed: {0}")]
    Authorization(DenyReason),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    #[error("signaling failed: {0}")]
    Signaling(String),

    #[error("peer connection lost: {0}")]
    NetworkDisconnect(String),

    #[error("invalid payload: {0}")]
    Validation(String),

    #[error("session status cannot move from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("feedback from user {from} for session {session} already submitted")]
    DuplicateFeedback { session: SessionId, from: UserId },

    #[error("feedback is locked until the session is completed")]
    FeedbackLocked,

    #[error("room opens at {opens_at}")]
    NotYetJoinable { opens_at: DateTime<Utc> },
}

impl DuetError {
    /// Fatal errors end the interview view; everything else keeps the session running.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DuetError::Authorization(_) | DuetError::SessionNotFound(_)
        )
    }
}
