use std::sync::Arc;

use duet_client::{ClockStore, Interview, LifecycleController, SessionClock};
use duet_core::{Role, ServerEvent, SessionId, SessionStatus};
use tokio::sync::mpsc;

use crate::integration::{InterviewMocks, init_tracing, test_config};
use crate::utils::{INTERVIEWER, RecordingSink, session};

async fn joined(mocks: &InterviewMocks) -> (Interview, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new(mocks.journal.clone()));
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(ServerEvent::Joined {
        session_id: SessionId::from("S1"),
        user_id: INTERVIEWER,
        role: Role::Interviewer,
        peer: None,
    })
    .unwrap();
    let lifecycle = LifecycleController::new(
        mocks.api.session(),
        INTERVIEWER,
        mocks.api.clone(),
        SessionClock::new(SessionId::from("S1"), mocks.clock_store.clone()),
        chrono::Duration::minutes(5),
    );
    let interview = Interview::join(&test_config(), mocks.deps(), lifecycle, sink.clone(), rx)
        .await
        .unwrap();
    (interview, sink)
}

#[tokio::test]
async fn test_exit_tears_down_in_order() {
    init_tracing();
    let mocks = InterviewMocks::new(session("S1", SessionStatus::Active));
    let (mut interview, sink) = joined(&mocks).await;
    interview.activate_video().await.unwrap();
    assert!(interview.toggle_screen_share().await.unwrap());

    interview.exit().await;

    let j = &mocks.journal;
    let leave = j.position("sink:send:leave_room").unwrap();
    let disconnect = j.position("sink:disconnect").unwrap();
    let close = j.position("t1:close").unwrap();
    let first_stop = j.position("track:stop").unwrap();
    assert!(leave < disconnect);
    assert!(disconnect < close);
    assert!(close < first_stop);
    assert_eq!(j.count("track:stop"), 3);

    assert!(sink.is_disconnected());
    assert!(
        mocks
            .clock_store
            .load(&SessionId::from("S1"))
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_exit_twice_is_harmless() {
    init_tracing();
    let mocks = InterviewMocks::new(session("S1", SessionStatus::Active));
    let (mut interview, _sink) = joined(&mocks).await;

    interview.exit().await;
    interview.exit().await;

    assert_eq!(mocks.journal.count("sink:disconnect"), 1);
    assert!(interview.next_update().await.is_none());
}

#[tokio::test]
async fn test_feedback_after_completion() {
    init_tracing();
    let mocks = InterviewMocks::new(session("S1", SessionStatus::Active));
    let (mut interview, _sink) = joined(&mocks).await;

    assert!(!interview.can_submit_feedback());
    interview.complete().await.unwrap();
    assert!(interview.can_submit_feedback());
    interview.submit_feedback(5, "solid").await.unwrap();
    interview.exit().await;

    assert_eq!(mocks.api.feedback().len(), 1);
    assert_eq!(mocks.api.session().status, SessionStatus::Completed);
}
