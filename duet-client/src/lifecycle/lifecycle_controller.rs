use crate::lifecycle::{JoinDecision, SessionApi, SessionClock};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use duet_core::{DenyReason, DuetError, Feedback, Session, SessionId, SessionStatus, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Client-side view of one session: join gating, elapsed time, completion, feedback.
pub struct LifecycleController {
    session: Session,
    self_id: UserId,
    api: Arc<dyn SessionApi>,
    clock: SessionClock,
    join_lead: ChronoDuration,
    feedback_sent: bool,
}

impl LifecycleController {
    pub fn new(
        session: Session,
        self_id: UserId,
        api: Arc<dyn SessionApi>,
        clock: SessionClock,
        join_lead: ChronoDuration,
    ) -> Self {
        Self {
            session,
            self_id,
            api,
            clock,
            join_lead,
            feedback_sent: false,
        }
    }

    /// Fetches the session; fails for non-participants and unknown sessions.
    pub async fn load(
        id: &SessionId,
        self_id: UserId,
        api: Arc<dyn SessionApi>,
        clock: SessionClock,
        join_lead: ChronoDuration,
    ) -> Result<Self, DuetError> {
        let session = api.get_session(id, self_id).await?;
        Ok(Self::new(session, self_id, api, clock, join_lead))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn self_id(&self) -> UserId {
        self.self_id
    }

    pub fn join_decision(&self, now: DateTime<Utc>, early_consent: bool) -> JoinDecision {
        JoinDecision::evaluate(&self.session, now, self.join_lead, early_consent)
    }

    /// Gate for sending `join_room`.
    pub fn check_join(&self, now: DateTime<Utc>, early_consent: bool) -> Result<(), DuetError> {
        match self.join_decision(now, early_consent) {
            decision if decision.allows_join() => Ok(()),
            JoinDecision::TooEarly { opens_at } => Err(DuetError::NotYetJoinable { opens_at }),
            _ => Err(DuetError::Authorization(DenyReason::SessionClosed)),
        }
    }

    /// First successful join: the clock starts (or resumes) and the session counts as active.
    pub fn on_joined(&mut self, now: DateTime<Utc>) {
        let started = self.clock.start(now);
        if self.session.status == SessionStatus::Scheduled {
            self.session.status = SessionStatus::Active;
        }
        info!("Session {} clock running since {}", self.session.id, started);
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.clock.elapsed(now)
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock {
        &mut self.clock
    }

    /// Safe to repeat; a network retry of a completed session is not an error.
    pub async fn complete(&mut self) -> Result<&Session, DuetError> {
        let session = self
            .api
            .complete_session(&self.session.id, self.self_id)
            .await?;
        if self.session.status != session.status {
            info!("Session {} is now {}", session.id, session.status);
        }
        self.session = session;
        self.clock.stop(Utc::now());
        Ok(&self.session)
    }

    pub fn can_submit_feedback(&self) -> bool {
        self.session.status == SessionStatus::Completed && !self.feedback_sent
    }

    pub async fn submit_feedback(
        &mut self,
        rating: u8,
        comments: &str,
    ) -> Result<Feedback, DuetError> {
        if self.session.status != SessionStatus::Completed {
            return Err(DuetError::FeedbackLocked);
        }
        if self.feedback_sent {
            return Err(DuetError::DuplicateFeedback {
                session: self.session.id.clone(),
                from: self.self_id,
            });
        }
        let to = self
            .session
            .counterpart_of(self.self_id)
            .ok_or(DuetError::Authorization(DenyReason::NotAParticipant))?;

        let result = self
            .api
            .submit_feedback(&self.session.id, self.self_id, to, rating, comments)
            .await;
        if matches!(result, Ok(_) | Err(DuetError::DuplicateFeedback { .. })) {
            self.feedback_sent = true;
        }
        result
    }
}
