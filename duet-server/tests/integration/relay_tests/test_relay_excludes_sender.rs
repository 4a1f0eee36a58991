use duet_core::{ConnectionId, IceCandidate, ServerEvent, SessionId, SessionStatus};
use duet_server::{RelayPayload, RoomCommand, RoomSettings};

use crate::integration::{TestRegistry, create_test_registry, init_tracing};
use crate::utils::{CANDIDATE, INTERVIEWER, OUTSIDER, drain, only_for, session};

async fn joined_pair() -> (TestRegistry, SessionId, ConnectionId, ConnectionId) {
    let mut reg = create_test_registry(
        vec![session("S1", SessionStatus::Active)],
        RoomSettings::default(),
    );
    let id = SessionId::from("S1");
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    reg.manager.join(a, &id, INTERVIEWER).await.unwrap();
    reg.manager.join(b, &id, CANDIDATE).await.unwrap();
    drain(&mut reg.rx);
    (reg, id, a, b)
}

#[tokio::test]
async fn test_offer_reaches_peer_once_and_never_echoes() {
    init_tracing();
    let (mut reg, id, a, b) = joined_pair().await;
    let sdp = "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\n".to_string();

    reg.manager
        .send(
            &id,
            RoomCommand::Relay {
                conn: a,
                payload: RelayPayload::Offer {
                    sdp: sdp.clone(),
                    claimed_from: INTERVIEWER,
                },
            },
        )
        .await;
    reg.settle(&id).await;
    let delivered = drain(&mut reg.rx);

    assert!(only_for(&delivered, a).is_empty());
    assert_eq!(
        only_for(&delivered, b),
        vec![ServerEvent::WebrtcOffer {
            sdp,
            from: INTERVIEWER
        }]
    );
}

#[tokio::test]
async fn test_spoofed_sender_is_rewritten() {
    init_tracing();
    let (mut reg, id, _a, b) = joined_pair().await;
    let candidate = IceCandidate {
        candidate: "candidate:1 1 udp 2122260223 192.0.2.1 54321 typ host".into(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    };

    reg.manager
        .send(
            &id,
            RoomCommand::Relay {
                conn: b,
                payload: RelayPayload::Ice {
                    candidate: candidate.clone(),
                    claimed_from: OUTSIDER,
                },
            },
        )
        .await;
    reg.settle(&id).await;
    let delivered = drain(&mut reg.rx);

    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].1,
        ServerEvent::WebrtcIce {
            candidate,
            from: CANDIDATE
        }
    );
}

#[tokio::test]
async fn test_non_member_connection_is_dropped() {
    init_tracing();
    let (mut reg, id, _a, _b) = joined_pair().await;

    reg.manager
        .send(
            &id,
            RoomCommand::Relay {
                conn: ConnectionId::new(),
                payload: RelayPayload::Code {
                    code: "rm -rf /".into(),
                    claimed_from: INTERVIEWER,
                },
            },
        )
        .await;
    reg.settle(&id).await;

    assert!(drain(&mut reg.rx).is_empty());
}
