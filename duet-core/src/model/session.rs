use crate::error::DuetError;
use crate::model::ids::{SessionId, UserId};
use crate::model::participant::Role;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

/// Result of a status change request.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Transition {
    Changed { from: SessionStatus, to: SessionStatus },
    /// Target equals the current status. Retries land here.
    Unchanged,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            SessionStatus::Scheduled => 0,
            SessionStatus::Active => 1,
            SessionStatus::Completed | SessionStatus::Cancelled => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Status only moves forward: scheduled -> active -> completed, and
    /// scheduled/active -> cancelled. Terminal states never change.
    pub fn advance(self, to: SessionStatus) -> Result<Transition, DuetError> {
        if self == to {
            return Ok(Transition::Unchanged);
        }
        if self.is_terminal() || to.rank() <= self.rank() {
            return Err(DuetError::InvalidTransition { from: self, to });
        }
        Ok(Transition::Changed { from: self, to })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub profession: String,
    pub language: String,
    pub slot_utc: DateTime<Utc>,
    pub status: SessionStatus,
    pub interviewer_user_id: UserId,
    pub candidate_user_id: UserId,
    /// Room of the external conferencing provider, used instead of the P2P path.
    #[serde(default)]
    pub room_token: Option<String>,
}

impl Session {
    pub fn role_of(&self, user_id: UserId) -> Option<Role> {
        if user_id == self.interviewer_user_id {
            Some(Role::Interviewer)
        } else if user_id == self.candidate_user_id {
            Some(Role::Candidate)
        } else {
            None
        }
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.role_of(user_id).is_some()
    }

    /// The other participant, if `user_id` is one of the two.
    pub fn counterpart_of(&self, user_id: UserId) -> Option<UserId> {
        match self.role_of(user_id)? {
            Role::Interviewer => Some(self.candidate_user_id),
            Role::Candidate => Some(self.interviewer_user_id),
        }
    }

    pub fn opens_at(&self, lead: Duration) -> DateTime<Utc> {
        self.slot_utc - lead
    }

    pub fn transition_to(&mut self, to: SessionStatus) -> Result<Transition, DuetError> {
        let transition = self.status.advance(to)?;
        self.status = to;
        Ok(transition)
    }
}
