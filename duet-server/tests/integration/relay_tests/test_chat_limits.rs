use duet_core::{ConnectionId, ServerEvent, SessionId, SessionStatus};
use duet_server::{RelayPayload, RoomCommand, RoomSettings};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::{CANDIDATE, INTERVIEWER, drain, only_for, session};

fn chat(conn: ConnectionId, message: &str) -> RoomCommand {
    RoomCommand::Relay {
        conn,
        payload: RelayPayload::Chat {
            user: "Alice".into(),
            message: message.into(),
        },
    }
}

#[tokio::test]
async fn test_chat_is_trimmed_filtered_and_ordered() {
    init_tracing();
    let settings = RoomSettings {
        max_chat_len: 5,
        max_code_bytes: 8,
        ..RoomSettings::default()
    };
    let mut reg = create_test_registry(vec![session("S1", SessionStatus::Active)], settings);
    let id = SessionId::from("S1");
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    reg.manager.join(a, &id, INTERVIEWER).await.unwrap();
    reg.manager.join(b, &id, CANDIDATE).await.unwrap();
    drain(&mut reg.rx);

    reg.manager.send(&id, chat(a, "   ")).await;
    reg.manager.send(&id, chat(a, "hello world")).await;
    reg.manager.send(&id, chat(a, "ok")).await;
    reg.manager
        .send(
            &id,
            RoomCommand::Relay {
                conn: a,
                payload: RelayPayload::Code {
                    code: "0123456789".into(),
                    claimed_from: INTERVIEWER,
                },
            },
        )
        .await;
    reg.settle(&id).await;

    let to_b = only_for(&drain(&mut reg.rx), b);
    assert_eq!(to_b.len(), 2);

    let (ServerEvent::ChatMessage(first), ServerEvent::ChatMessage(second)) = (&to_b[0], &to_b[1])
    else {
        panic!("expected two chat messages, got {to_b:?}");
    };
    assert_eq!(first.user, "Alice");
    assert_eq!(first.message, "hello");
    assert_eq!(second.message, "ok");
    assert!(second.at >= first.at);
}
