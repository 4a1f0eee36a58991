use duet_core::{IceConfig, Session, SessionStatus};
use duet_server::RoomSettings;
use reqwest::StatusCode;
use serde_json::json;

use crate::integration::{init_tracing, spawn_server};
use crate::utils::session;

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    init_tracing();
    let addr = spawn_server(vec![], RoomSettings::default()).await;
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();

    let created = http
        .post(format!("{base}/api/sessions"))
        .json(&session("S1", SessionStatus::Active))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let fetched: Session = http
        .get(format!("{base}/api/sessions/S1?userId=111"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.room_token.as_deref(), Some("ext-S1"));

    let forbidden = http
        .get(format!("{base}/api/sessions/S1?userId=333"))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let early_feedback = http
        .post(format!("{base}/api/sessions/S1/feedback"))
        .json(&json!({ "fromUserId": 111, "toUserId": 222, "rating": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(early_feedback.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for _ in 0..2 {
        let completed: Session = http
            .post(format!("{base}/api/sessions/S1/complete"))
            .json(&json!({ "userId": 222 }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
    }

    let bad_rating = http
        .post(format!("{base}/api/sessions/S1/feedback"))
        .json(&json!({ "fromUserId": 111, "toUserId": 222, "rating": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_rating.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let first = http
        .post(format!("{base}/api/sessions/S1/feedback"))
        .json(&json!({ "fromUserId": 111, "toUserId": 222, "rating": 4, "comments": "clear" }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = http
        .post(format!("{base}/api/sessions/S1/feedback"))
        .json(&json!({ "fromUserId": 111, "toUserId": 222, "rating": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ice_config_and_health() {
    init_tracing();
    let addr = spawn_server(vec![], RoomSettings::default()).await;
    let base = format!("http://{addr}");

    let ice: IceConfig = reqwest::get(format!("{base}/api/ice-config?userId=111"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!ice.ice_servers.is_empty());
    assert!(ice.ice_servers[0].urls[0].starts_with("stun:"));

    let health: serde_json::Value = reqwest::get(format!("{base}/healthz"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["rooms"], 0);
}

#[tokio::test]
async fn test_missing_session_is_not_found() {
    init_tracing();
    let addr = spawn_server(vec![], RoomSettings::default()).await;

    let res = reqwest::get(format!("http://{addr}/api/sessions/nope?userId=111"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
