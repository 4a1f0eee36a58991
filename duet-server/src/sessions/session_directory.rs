use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::{DuetError, Session, SessionId, SessionStatus, Transition};
use tracing::info;

/// Source of truth for scheduled sessions. Filled by the external scheduler.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn get(&self, id: &SessionId) -> Option<Session>;

    async fn insert(&self, session: Session) -> Result<Session, DuetError>;

    /// Moves the status forward atomically. Repeating the current status is `Unchanged`.
    async fn transition(
        &self,
        id: &SessionId,
        to: SessionStatus,
    ) -> Result<(Session, Transition), DuetError>;
}

#[derive(Default)]
pub struct InMemorySessions {
    sessions: DashMap<SessionId, Session>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let map = DashMap::new();
        for s in sessions {
            map.insert(s.id.clone(), s);
        }
        Self { sessions: map }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessions {
    async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    async fn insert(&self, session: Session) -> Result<Session, DuetError> {
        if session.interviewer_user_id == session.candidate_user_id {
            return Err(DuetError::Validation(
                "interviewer and candidate must be different users".into(),
            ));
        }
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(DuetError::Validation(format!(
                "session {} already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                info!("Session {} scheduled at {}", session.id, session.slot_utc);
                Ok(slot.insert(session).value().clone())
            }
        }
    }

    async fn transition(
        &self,
        id: &SessionId,
        to: SessionStatus,
    ) -> Result<(Session, Transition), DuetError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| DuetError::SessionNotFound(id.clone()))?;

        let transition = entry.transition_to(to)?;
        if let Transition::Changed { from, to } = transition {
            info!("Session {} moved {} -> {}", id, from, to);
        }
        Ok((entry.value().clone(), transition))
    }
}
