use chrono::{DateTime, Duration, Utc};
use duet_core::{Session, SessionStatus};

/// Whether the client may send `join_room` yet. Membership is still checked by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Open,
    /// Before the window, allowed because the user consented to join early.
    EarlyWithConsent,
    TooEarly { opens_at: DateTime<Utc> },
    Closed,
}

impl JoinDecision {
    pub fn evaluate(
        session: &Session,
        now: DateTime<Utc>,
        lead: Duration,
        early_consent: bool,
    ) -> Self {
        if session.status.is_terminal() {
            return JoinDecision::Closed;
        }
        if session.status == SessionStatus::Active {
            return JoinDecision::Open;
        }

        let opens_at = session.opens_at(lead);
        if now >= opens_at {
            JoinDecision::Open
        } else if early_consent {
            JoinDecision::EarlyWithConsent
        } else {
            JoinDecision::TooEarly { opens_at }
        }
    }

    pub fn allows_join(self) -> bool {
        matches!(self, JoinDecision::Open | JoinDecision::EarlyWithConsent)
    }
}
