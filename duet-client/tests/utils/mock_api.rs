use crate::utils::Journal;
use async_trait::async_trait;
use chrono::Utc;
use duet_client::SessionApi;
use duet_core::{
    DenyReason, DuetError, Feedback, IceConfig, IceServerConfig, Rating, Session, SessionId,
    SessionStatus, UserId,
};
use std::sync::Mutex;

/// In-memory stand-in for the HTTP session API with the server's rules.
pub struct MockSessionApi {
    journal: Journal,
    session: Mutex<Session>,
    feedback: Mutex<Vec<Feedback>>,
}

impl MockSessionApi {
    pub fn new(session: Session, journal: Journal) -> Self {
        Self {
            journal,
            session: Mutex::new(session),
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> Session {
        self.session.lock().unwrap().clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.feedback.lock().unwrap().clone()
    }

    fn authorized(&self, id: &SessionId, user: UserId) -> Result<Session, DuetError> {
        let session = self.session();
        if &session.id != id {
            return Err(DuetError::SessionNotFound(id.clone()));
        }
        if !session.is_participant(user) {
            return Err(DuetError::Authorization(DenyReason::NotAParticipant));
        }
        Ok(session)
    }
}

#[async_trait]
impl SessionApi for MockSessionApi {
    async fn get_session(&self, id: &SessionId, user: UserId) -> Result<Session, DuetError> {
        self.journal.record("api:get_session");
        self.authorized(id, user)
    }

    async fn complete_session(&self, id: &SessionId, user: UserId) -> Result<Session, DuetError> {
        self.journal.record("api:complete_session");
        self.authorized(id, user)?;
        let mut session = self.session.lock().unwrap();
        session.transition_to(SessionStatus::Completed)?;
        Ok(session.clone())
    }

    async fn submit_feedback(
        &self,
        id: &SessionId,
        from_user_id: UserId,
        to_user_id: UserId,
        rating: u8,
        comments: &str,
    ) -> Result<Feedback, DuetError> {
        self.journal.record("api:submit_feedback");
        let session = self.authorized(id, from_user_id)?;
        if session.status != SessionStatus::Completed {
            return Err(DuetError::FeedbackLocked);
        }
        let mut stored = self.feedback.lock().unwrap();
        if stored.iter().any(|f| f.from_user_id == from_user_id) {
            return Err(DuetError::DuplicateFeedback {
                session: id.clone(),
                from: from_user_id,
            });
        }
        let feedback = Feedback {
            session_id: id.clone(),
            from_user_id,
            to_user_id,
            rating: Rating::new(rating)?,
            comments: comments.to_owned(),
            submitted_at: Utc::now(),
        };
        stored.push(feedback.clone());
        Ok(feedback)
    }

    async fn get_ice_config(&self, _user_id: UserId) -> Result<IceConfig, DuetError> {
        self.journal.record("api:get_ice_config");
        Ok(IceConfig {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.example.org:3478".into()],
                username: None,
                credential: None,
            }],
        })
    }
}
