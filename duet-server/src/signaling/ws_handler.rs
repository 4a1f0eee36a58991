use crate::app::AppState;
use crate::room::{RelayPayload, RoomCommand};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use duet_core::{ClientEvent, ConnectionId, DenyReason, ServerEvent, SessionId, UserId};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// What one socket is bound to. Identity is fixed by the first accepted join.
struct ConnectionContext {
    conn: ConnectionId,
    user_id: Option<UserId>,
    session_id: Option<SessionId>,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn = ConnectionId::new();
    info!("New WebSocket connection: {}", conn);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_connection(conn, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            let mut ctx = ConnectionContext {
                conn,
                user_id: None,
                session_id: None,
            };

            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match ClientEvent::decode(text.as_str()) {
                        Ok(event) => handle_event(&state, &mut ctx, event).await,
                        Err(e) => warn!("Invalid relay event from {}: {}", conn, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            // Socket gone without leave_room: the room holds the seat for a while.
            if let Some(session_id) = ctx.session_id.take() {
                state
                    .room_manager
                    .send(&session_id, RoomCommand::Disconnect { conn })
                    .await;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.signaling.remove_connection(&conn);
    info!("WebSocket disconnected: {}", conn);
}

async fn handle_event(state: &AppState, ctx: &mut ConnectionContext, event: ClientEvent) {
    match event {
        ClientEvent::JoinRoom {
            session_id,
            user_id,
        } => {
            if ctx.user_id.is_some_and(|bound| bound != user_id) {
                warn!(
                    "Connection {} bound to user {:?} tried to join as {}",
                    ctx.conn, ctx.user_id, user_id
                );
                state.signaling.send_event(
                    ctx.conn,
                    &ServerEvent::JoinDenied {
                        reason: DenyReason::IdentityMismatch,
                    },
                );
                return;
            }

            if let Some(previous) = ctx.session_id.take_if(|s| *s != session_id) {
                state
                    .room_manager
                    .send(&previous, RoomCommand::Leave { conn: ctx.conn })
                    .await;
            }

            if state
                .room_manager
                .join(ctx.conn, &session_id, user_id)
                .await
                .is_ok()
            {
                ctx.user_id = Some(user_id);
                ctx.session_id = Some(session_id);
            }
        }

        ClientEvent::LeaveRoom { session_id } => {
            if ctx.session_id.as_ref() != Some(&session_id) {
                debug!("Connection {} left a room it was not in", ctx.conn);
                return;
            }
            ctx.session_id = None;
            state
                .room_manager
                .send(&session_id, RoomCommand::Leave { conn: ctx.conn })
                .await;
        }

        other => {
            let session_id = other.session_id().clone();
            if ctx.session_id.as_ref() != Some(&session_id) {
                warn!(
                    "Connection {} sent an event for session {} it has not joined",
                    ctx.conn, session_id
                );
                return;
            }
            let Some(payload) = RelayPayload::from_client(other) else {
                return;
            };
            let delivered = state
                .room_manager
                .send(
                    &session_id,
                    RoomCommand::Relay {
                        conn: ctx.conn,
                        payload,
                    },
                )
                .await;
            if !delivered {
                warn!("Room {} is gone; dropping event from {}", session_id, ctx.conn);
                ctx.session_id = None;
            }
        }
    }
}
