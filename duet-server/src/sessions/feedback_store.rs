use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::{DuetError, Feedback, SessionId, UserId};
use tracing::info;

/// At most one feedback per (session, author).
#[derive(Default)]
pub struct FeedbackStore {
    records: DashMap<(SessionId, UserId), Feedback>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent under the shard lock, so two concurrent submissions
    /// from the same author cannot both succeed.
    pub fn insert(&self, feedback: Feedback) -> Result<(), DuetError> {
        let key = (feedback.session_id.clone(), feedback.from_user_id);
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(DuetError::DuplicateFeedback {
                session: feedback.session_id,
                from: feedback.from_user_id,
            }),
            Entry::Vacant(slot) => {
                info!(
                    "Feedback recorded for session {} from user {}",
                    feedback.session_id, feedback.from_user_id
                );
                slot.insert(feedback);
                Ok(())
            }
        }
    }
}
