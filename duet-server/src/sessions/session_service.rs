use crate::sessions::{FeedbackStore, SessionDirectory};
use chrono::Utc;
use duet_core::{
    DenyReason, DuetError, Feedback, Rating, Session, SessionId, SessionStatus, Transition, UserId,
};
use std::sync::Arc;
use tracing::info;

/// Session API as seen by participants: read, complete, rate.
#[derive(Clone)]
pub struct SessionService {
    directory: Arc<dyn SessionDirectory>,
    feedback: Arc<FeedbackStore>,
}

impl SessionService {
    pub fn new(directory: Arc<dyn SessionDirectory>, feedback: Arc<FeedbackStore>) -> Self {
        Self {
            directory,
            feedback,
        }
    }

    pub fn directory(&self) -> Arc<dyn SessionDirectory> {
        self.directory.clone()
    }

    pub async fn create_session(&self, session: Session) -> Result<Session, DuetError> {
        self.directory.insert(session).await
    }

    /// Only the two participants may read a session.
    pub async fn get_session(
        &self,
        id: &SessionId,
        requesting_user: UserId,
    ) -> Result<Session, DuetError> {
        let session = self
            .directory
            .get(id)
            .await
            .ok_or_else(|| DuetError::SessionNotFound(id.clone()))?;
        if !session.is_participant(requesting_user) {
            return Err(DuetError::Authorization(DenyReason::NotAParticipant));
        }
        Ok(session)
    }

    /// Idempotent: completing a completed session returns it unchanged.
    pub async fn complete_session(
        &self,
        id: &SessionId,
        requesting_user: UserId,
    ) -> Result<Session, DuetError> {
        self.get_session(id, requesting_user).await?;
        let (session, transition) = self
            .directory
            .transition(id, SessionStatus::Completed)
            .await?;
        if transition == Transition::Unchanged {
            info!("Session {} already completed; repeated request ignored", id);
        }
        Ok(session)
    }

    pub async fn submit_feedback(
        &self,
        id: &SessionId,
        from_user_id: UserId,
        to_user_id: UserId,
        rating: u8,
        comments: String,
    ) -> Result<Feedback, DuetError> {
        let session = self.get_session(id, from_user_id).await?;
        if session.status != SessionStatus::Completed {
            return Err(DuetError::FeedbackLocked);
        }
        if session.counterpart_of(from_user_id) != Some(to_user_id) {
            return Err(DuetError::Validation(
                "feedback must address the other participant".into(),
            ));
        }

        let feedback = Feedback {
            session_id: id.clone(),
            from_user_id,
            to_user_id,
            rating: Rating::new(rating)?,
            comments,
            submitted_at: Utc::now(),
        };
        self.feedback.insert(feedback.clone())?;
        Ok(feedback)
    }
}
