use crate::model::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
}

impl Role {
    pub fn counterpart(self) -> Self {
        match self {
            Role::Interviewer => Role::Candidate,
            Role::Candidate => Role::Interviewer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Interviewer => f.write_str("interviewer"),
            Role::Candidate => f.write_str("candidate"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Joining, or socket dropped and the reconnect grace window is still open.
    Connecting,
    Connected,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    pub role: Role,
    pub connection_state: ConnectionState,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            connection_state: ConnectionState::Disconnected,
            last_seen_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = Some(now);
    }
}
