use crate::room::{Room, RoomCommand, RoomSettings};
use crate::sessions::SessionDirectory;
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use duet_core::{ConnectionId, DenyReason, Participant, Role, ServerEvent, Session, SessionId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Owns the `sessionId -> room task` table. Each room task is the single writer of its state.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<SessionId, mpsc::Sender<RoomCommand>>>,
    sessions: Arc<dyn SessionDirectory>,
    signaling: Arc<dyn SignalingOutput>,
    settings: RoomSettings,
}

impl RoomManager {
    pub fn new(
        sessions: Arc<dyn SessionDirectory>,
        signaling: Arc<dyn SignalingOutput>,
        settings: RoomSettings,
    ) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            sessions,
            signaling,
            settings,
        }
    }

    /// Authorizes `join_room` and hands it to the room. The caller always gets
    /// exactly one of `joined` / `join_denied`.
    pub async fn join(
        &self,
        conn: ConnectionId,
        session_id: &SessionId,
        user_id: UserId,
    ) -> Result<Role, DenyReason> {
        let session = match self.authorize(session_id, user_id).await {
            Ok(session) => session,
            Err(reason) => {
                warn!(
                    "Join denied for user {} in session {}: {}",
                    user_id, session_id, reason
                );
                self.deny(conn, reason).await;
                return Err(reason);
            }
        };

        // A room that shuts down with this join still queued drops the reply;
        // the second attempt lands in a fresh room.
        for _ in 0..2 {
            let (reply_tx, reply_rx) = oneshot::channel();
            let cmd = RoomCommand::Join {
                conn,
                user_id,
                reply: reply_tx,
            };
            if !self.dispatch_to(&session, cmd).await {
                break;
            }
            if let Ok(result) = reply_rx.await {
                return result;
            }
        }

        warn!("Room {} unavailable for user {}", session_id, user_id);
        self.deny(conn, DenyReason::SessionClosed).await;
        Err(DenyReason::SessionClosed)
    }

    async fn deny(&self, conn: ConnectionId, reason: DenyReason) {
        self.signaling
            .deliver(conn, ServerEvent::JoinDenied { reason })
            .await;
    }

    /// Sends a command to a live room. Commands for rooms that no longer exist are dropped.
    pub async fn send(&self, session_id: &SessionId, cmd: RoomCommand) -> bool {
        let Some(sender) = self.rooms.get(session_id).map(|s| s.clone()) else {
            return false;
        };
        sender.send(cmd).await.is_ok()
    }

    pub async fn participants(&self, session_id: &SessionId) -> Option<Vec<Participant>> {
        let (tx, rx) = oneshot::channel();
        if !self.send(session_id, RoomCommand::Snapshot { reply: tx }).await {
            return None;
        }
        rx.await.ok()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.iter().filter(|r| !r.value().is_closed()).count()
    }

    async fn authorize(
        &self,
        session_id: &SessionId,
        user_id: UserId,
    ) -> Result<Session, DenyReason> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or(DenyReason::SessionNotFound)?;

        if session.status.is_terminal() {
            return Err(DenyReason::SessionClosed);
        }
        if !session.is_participant(user_id) {
            return Err(DenyReason::NotAParticipant);
        }
        Ok(session)
    }

    /// Delivers to the room, spawning it when absent. A room that shut down between
    /// lookup and send is replaced once.
    async fn dispatch_to(&self, session: &Session, cmd: RoomCommand) -> bool {
        let sender = self.room_sender(session);
        match sender.send(cmd).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(cmd)) => {
                self.rooms.remove_if(&session.id, |_, tx| tx.is_closed());
                self.room_sender(session).send(cmd).await.is_ok()
            }
        }
    }

    fn room_sender(&self, session: &Session) -> mpsc::Sender<RoomCommand> {
        let entry = self
            .rooms
            .entry(session.id.clone())
            .and_modify(|tx| {
                if tx.is_closed() {
                    *tx = self.spawn_room(session);
                }
            })
            .or_insert_with(|| self.spawn_room(session));
        entry.value().clone()
    }

    fn spawn_room(&self, session: &Session) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", session.id);
        let (tx, rx) = mpsc::channel(100);

        let room = Room::new(
            session,
            rx,
            self.signaling.clone(),
            self.sessions.clone(),
            self.settings.clone(),
        );

        let rooms = self.rooms.clone();
        let session_id = session.id.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove_if(&session_id, |_, tx| tx.is_closed());
        });

        tx
    }
}
