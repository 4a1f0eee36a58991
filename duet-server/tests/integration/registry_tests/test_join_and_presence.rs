use duet_core::{
    ConnectionId, ConnectionState, PeerPresence, Role, ServerEvent, SessionId, SessionStatus,
};
use duet_server::{RoomSettings, SessionDirectory};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::{CANDIDATE, INTERVIEWER, drain, only_for, session};

#[tokio::test]
async fn test_first_participant_sees_offline_peer() {
    init_tracing();
    let mut reg = create_test_registry(
        vec![session("S1", SessionStatus::Scheduled)],
        RoomSettings::default(),
    );
    let id = SessionId::from("S1");
    let conn = ConnectionId::new();

    let role = reg.manager.join(conn, &id, INTERVIEWER).await;
    assert_eq!(role, Ok(Role::Interviewer));

    let delivered = drain(&mut reg.rx);
    assert_eq!(
        only_for(&delivered, conn),
        vec![ServerEvent::Joined {
            session_id: id.clone(),
            user_id: INTERVIEWER,
            role: Role::Interviewer,
            peer: Some(PeerPresence {
                user_id: CANDIDATE,
                role: Role::Candidate,
                online: false,
            }),
        }]
    );
}

#[tokio::test]
async fn test_second_participant_triggers_presence_both_ways() {
    init_tracing();
    let mut reg = create_test_registry(
        vec![session("S1", SessionStatus::Scheduled)],
        RoomSettings::default(),
    );
    let id = SessionId::from("S1");
    let a = ConnectionId::new();
    let b = ConnectionId::new();

    reg.manager.join(a, &id, INTERVIEWER).await.unwrap();
    drain(&mut reg.rx);
    reg.manager.join(b, &id, CANDIDATE).await.unwrap();
    let delivered = drain(&mut reg.rx);

    assert_eq!(
        only_for(&delivered, a),
        vec![ServerEvent::PresenceUpdate {
            user_id: CANDIDATE,
            role: Role::Candidate,
            left: false,
        }]
    );

    let to_b = only_for(&delivered, b);
    assert_eq!(to_b.len(), 2);
    assert!(matches!(
        &to_b[0],
        ServerEvent::Joined { role: Role::Candidate, peer: Some(p), .. } if p.online
    ));
    assert_eq!(
        to_b[1],
        ServerEvent::PresenceUpdate {
            user_id: INTERVIEWER,
            role: Role::Interviewer,
            left: false,
        }
    );

    let participants = reg.manager.participants(&id).await.unwrap();
    assert!(
        participants
            .iter()
            .all(|p| p.connection_state == ConnectionState::Connected)
    );
}

#[tokio::test]
async fn test_first_join_activates_session() {
    init_tracing();
    let reg = create_test_registry(
        vec![session("S1", SessionStatus::Scheduled)],
        RoomSettings::default(),
    );
    let id = SessionId::from("S1");

    reg.manager
        .join(ConnectionId::new(), &id, CANDIDATE)
        .await
        .unwrap();

    let stored = reg.sessions.get(&id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
}
