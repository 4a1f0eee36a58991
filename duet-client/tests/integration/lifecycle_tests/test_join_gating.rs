use chrono::{Duration, Utc};
use duet_client::{JoinDecision, LifecycleController, MemoryClockStore, SessionClock};
use duet_core::{DenyReason, DuetError, SessionId, SessionStatus};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{INTERVIEWER, Journal, MockSessionApi, OUTSIDER, session};

async fn controller(
    slot_offset: Duration,
    status: SessionStatus,
) -> Result<LifecycleController, DuetError> {
    let mut s = session("S1", status);
    s.slot_utc = Utc::now() + slot_offset;
    let api = Arc::new(MockSessionApi::new(s, Journal::new()));
    let clock = SessionClock::new(SessionId::from("S1"), Arc::new(MemoryClockStore::new()));
    LifecycleController::load(
        &SessionId::from("S1"),
        INTERVIEWER,
        api,
        clock,
        Duration::minutes(5),
    )
    .await
}

#[tokio::test]
async fn test_join_opens_five_minutes_before_slot() {
    init_tracing();
    let lc = controller(Duration::minutes(4), SessionStatus::Scheduled)
        .await
        .unwrap();
    assert_eq!(lc.join_decision(Utc::now(), false), JoinDecision::Open);
    assert!(lc.check_join(Utc::now(), false).is_ok());
}

#[tokio::test]
async fn test_early_join_needs_consent() {
    init_tracing();
    let lc = controller(Duration::hours(1), SessionStatus::Scheduled)
        .await
        .unwrap();
    let now = Utc::now();

    let err = lc.check_join(now, false).unwrap_err();
    let DuetError::NotYetJoinable { opens_at } = err else {
        panic!("expected NotYetJoinable, got {err:?}");
    };
    assert_eq!(opens_at, lc.session().slot_utc - Duration::minutes(5));

    assert_eq!(lc.join_decision(now, true), JoinDecision::EarlyWithConsent);
    assert!(lc.check_join(now, true).is_ok());
}

#[tokio::test]
async fn test_active_session_is_always_open() {
    init_tracing();
    let lc = controller(Duration::hours(3), SessionStatus::Active)
        .await
        .unwrap();
    assert_eq!(lc.join_decision(Utc::now(), false), JoinDecision::Open);
}

#[tokio::test]
async fn test_terminal_session_cannot_be_joined() {
    init_tracing();
    for status in [SessionStatus::Completed, SessionStatus::Cancelled] {
        let lc = controller(Duration::minutes(1), status).await.unwrap();
        assert!(matches!(
            lc.check_join(Utc::now(), true),
            Err(DuetError::Authorization(DenyReason::SessionClosed))
        ));
    }
}

#[tokio::test]
async fn test_outsider_cannot_load_session() {
    init_tracing();
    let api = Arc::new(MockSessionApi::new(
        session("S1", SessionStatus::Scheduled),
        Journal::new(),
    ));
    let clock = SessionClock::new(SessionId::from("S1"), Arc::new(MemoryClockStore::new()));

    let result = LifecycleController::load(
        &SessionId::from("S1"),
        OUTSIDER,
        api,
        clock,
        Duration::minutes(5),
    )
    .await;

    assert!(matches!(
        result,
        Err(DuetError::Authorization(DenyReason::NotAParticipant))
    ));
}
