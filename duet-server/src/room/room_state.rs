use chrono::{DateTime, Utc};
use duet_core::{
    ConnectionId, ConnectionState, DenyReason, Participant, PeerPresence, Role, Session,
    SessionId, UserId,
};
use std::collections::HashMap;

/// Outcome of an accepted `join_room`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The user was offline; the peer must hear about it.
    Entered { role: Role },
    /// The user came back inside the reconnect window; the peer was told it went offline.
    Reconnected { role: Role },
    /// The user was already connected. `replaced` is the connection that this join
    /// superseded, if any.
    Resumed {
        role: Role,
        replaced: Option<ConnectionId>,
    },
}

impl JoinOutcome {
    pub fn role(&self) -> Role {
        match self {
            JoinOutcome::Entered { role }
            | JoinOutcome::Reconnected { role }
            | JoinOutcome::Resumed { role, .. } => *role,
        }
    }
}

/// Membership and presence of one session. Owned by exactly one room task.
#[derive(Debug)]
pub struct RoomState {
    session_id: SessionId,
    participants: HashMap<UserId, Participant>,
    connections: HashMap<UserId, ConnectionId>,
}

impl RoomState {
    /// Seats are fixed at creation: the session's interviewer and candidate.
    pub fn new(session: &Session) -> Self {
        let mut participants = HashMap::with_capacity(2);
        participants.insert(
            session.interviewer_user_id,
            Participant::new(session.interviewer_user_id, Role::Interviewer),
        );
        participants.insert(
            session.candidate_user_id,
            Participant::new(session.candidate_user_id, Role::Candidate),
        );

        Self {
            session_id: session.id.clone(),
            participants,
            connections: HashMap::with_capacity(2),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn join(
        &mut self,
        user_id: UserId,
        conn: ConnectionId,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, DenyReason> {
        let Some(participant) = self.participants.get_mut(&user_id) else {
            return Err(DenyReason::NotAParticipant);
        };

        let previous_state = participant.connection_state;
        participant.connection_state = ConnectionState::Connected;
        participant.touch(now);
        let role = participant.role;

        let previous_conn = self.connections.insert(user_id, conn);

        match previous_state {
            ConnectionState::Disconnected => Ok(JoinOutcome::Entered { role }),
            ConnectionState::Connecting => Ok(JoinOutcome::Reconnected { role }),
            ConnectionState::Connected => Ok(JoinOutcome::Resumed {
                role,
                replaced: previous_conn.filter(|c| *c != conn),
            }),
        }
    }

    /// Resolves a connection to the seat it currently holds.
    pub fn member_of(&self, conn: ConnectionId) -> Option<(UserId, Role)> {
        let (user_id, _) = self.connections.iter().find(|(_, c)| **c == conn)?;
        let participant = self.participants.get(user_id)?;
        Some((*user_id, participant.role))
    }

    pub fn touch(&mut self, user_id: UserId, now: DateTime<Utc>) {
        if let Some(p) = self.participants.get_mut(&user_id) {
            p.touch(now);
        }
    }

    /// Live connections of everyone except `user_id`.
    pub fn peer_connections(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(uid, _)| **uid != user_id)
            .filter(|(uid, _)| {
                self.participants
                    .get(uid)
                    .is_some_and(Participant::is_connected)
            })
            .map(|(_, conn)| *conn)
            .collect()
    }

    pub fn peer_presence(&self, user_id: UserId) -> Option<PeerPresence> {
        self.participants
            .values()
            .find(|p| p.user_id != user_id)
            .map(|p| PeerPresence {
                user_id: p.user_id,
                role: p.role,
                online: p.is_connected(),
            })
    }

    /// Socket dropped without an explicit leave. The seat stays reserved.
    /// Returns the user only when `conn` was that user's current connection.
    pub fn suspend(&mut self, conn: ConnectionId, now: DateTime<Utc>) -> Option<UserId> {
        let (user_id, _) = self.member_of(conn)?;
        self.connections.remove(&user_id);
        let participant = self.participants.get_mut(&user_id)?;
        participant.connection_state = ConnectionState::Connecting;
        participant.touch(now);
        Some(user_id)
    }

    /// Final departure. Returns the role when the user was not already offline.
    pub fn leave(&mut self, user_id: UserId, now: DateTime<Utc>) -> Option<Role> {
        self.connections.remove(&user_id);
        let participant = self.participants.get_mut(&user_id)?;
        if participant.connection_state == ConnectionState::Disconnected {
            return None;
        }
        participant.connection_state = ConnectionState::Disconnected;
        participant.touch(now);
        Some(participant.role)
    }

    pub fn is_deserted(&self) -> bool {
        self.participants
            .values()
            .all(|p| p.connection_state == ConnectionState::Disconnected)
    }

    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.participants.values().cloned().collect();
        list.sort_by_key(|p| p.role == Role::Candidate);
        list
    }
}
