use crate::room::room_command::{RelayPayload, RoomCommand};
use crate::room::room_settings::RoomSettings;
use crate::room::room_state::{JoinOutcome, RoomState};
use crate::sessions::SessionDirectory;
use crate::signaling::SignalingOutput;
use chrono::{DateTime, Utc};
use duet_core::{
    ChatMessage, ConnectionId, DenyReason, DuetError, Role, ServerEvent, Session, SessionStatus,
    UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Room actor. The only writer of a session's presence; commands are applied one at a time.
pub struct Room {
    state: RoomState,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    sessions: Arc<dyn SessionDirectory>,
    settings: RoomSettings,
    /// Reconnect windows of suspended users.
    grace_deadlines: HashMap<UserId, Instant>,
    last_chat_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn new(
        session: &Session,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        sessions: Arc<dyn SessionDirectory>,
        settings: RoomSettings,
    ) -> Self {
        Self {
            state: RoomState::new(session),
            command_rx,
            signaling,
            sessions,
            settings,
            grace_deadlines: HashMap::new(),
            last_chat_at: None,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.state.session_id());

        loop {
            let next_deadline = self.grace_deadlines.values().min().copied();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down room.");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                    if next_deadline.is_some() => {
                    self.expire_grace_windows().await;
                }
            }

            if self.state.is_deserted() && self.grace_deadlines.is_empty() {
                info!("Room {} is empty", self.state.session_id());
                break;
            }
        }

        info!("Room {} event loop finished", self.state.session_id());
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn,
                user_id,
                reply,
            } => self.handle_join(conn, user_id, reply).await,

            RoomCommand::Leave { conn } => {
                let Some((user_id, _)) = self.state.member_of(conn) else {
                    debug!("Leave from non-member connection {}", conn);
                    return;
                };
                self.finalize_departure(user_id).await;
            }

            RoomCommand::Disconnect { conn } => {
                let Some((user_id, role)) = self.state.member_of(conn) else {
                    return;
                };
                if self.settings.reconnect_grace.is_zero() {
                    self.finalize_departure(user_id).await;
                    return;
                }
                self.state.suspend(conn, Utc::now());
                info!(
                    "User {} dropped from room {}, holding seat for {:?}",
                    user_id,
                    self.state.session_id(),
                    self.settings.reconnect_grace
                );
                self.grace_deadlines
                    .insert(user_id, Instant::now() + self.settings.reconnect_grace);
                // The seat is held, but the peer sees the user offline right away.
                self.broadcast(
                    user_id,
                    ServerEvent::PresenceUpdate {
                        user_id,
                        role,
                        left: true,
                    },
                )
                .await;
            }

            RoomCommand::Relay { conn, payload } => self.handle_relay(conn, payload).await,

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.participants());
            }
        }
    }

    async fn handle_join(
        &mut self,
        conn: ConnectionId,
        user_id: UserId,
        reply: oneshot::Sender<Result<Role, DenyReason>>,
    ) {
        let outcome = match self.state.join(user_id, conn, Utc::now()) {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(
                    "Join denied for user {} in room {}: {}",
                    user_id,
                    self.state.session_id(),
                    reason
                );
                self.signaling
                    .deliver(conn, ServerEvent::JoinDenied { reason })
                    .await;
                let _ = reply.send(Err(reason));
                return;
            }
        };

        self.grace_deadlines.remove(&user_id);
        let role = outcome.role();

        self.signaling
            .deliver(
                conn,
                ServerEvent::Joined {
                    session_id: self.state.session_id().clone(),
                    user_id,
                    role,
                    peer: self.state.peer_presence(user_id),
                },
            )
            .await;

        match outcome {
            JoinOutcome::Entered { .. } => {
                info!(
                    "User {} ({}) entered room {}",
                    user_id,
                    role,
                    self.state.session_id()
                );
                self.broadcast(
                    user_id,
                    ServerEvent::PresenceUpdate {
                        user_id,
                        role,
                        left: false,
                    },
                )
                .await;
                self.activate_session().await;
            }
            JoinOutcome::Reconnected { .. } => {
                info!(
                    "User {} ({}) reconnected to room {}",
                    user_id,
                    role,
                    self.state.session_id()
                );
                self.broadcast(
                    user_id,
                    ServerEvent::PresenceUpdate {
                        user_id,
                        role,
                        left: false,
                    },
                )
                .await;
            }
            JoinOutcome::Resumed { replaced, .. } => {
                debug!("User {} resumed in room {}", user_id, self.state.session_id());
                if let Some(old) = replaced {
                    info!("Connection {} superseded by {} for user {}", old, conn, user_id);
                }
            }
        }

        // The joiner learns about a peer that is already here.
        if let Some(peer) = self.state.peer_presence(user_id).filter(|p| p.online) {
            self.signaling
                .deliver(
                    conn,
                    ServerEvent::PresenceUpdate {
                        user_id: peer.user_id,
                        role: peer.role,
                        left: false,
                    },
                )
                .await;
        }

        let _ = reply.send(Ok(role));
    }

    async fn handle_relay(&mut self, conn: ConnectionId, payload: RelayPayload) {
        let Some((user_id, role)) = self.state.member_of(conn) else {
            warn!(
                "Dropping {} from connection {} outside room {}",
                payload.kind(),
                conn,
                self.state.session_id()
            );
            return;
        };

        if let Some(claimed) = payload.claimed_from()
            && claimed != user_id
        {
            warn!(
                "Connection {} claimed to be user {} but is user {}; rewriting sender",
                conn, claimed, user_id
            );
        }

        let now = Utc::now();
        self.state.touch(user_id, now);

        let event = match payload {
            RelayPayload::Presence { left: true } => {
                self.finalize_departure(user_id).await;
                return;
            }
            RelayPayload::Presence { left: false } => ServerEvent::PresenceUpdate {
                user_id,
                role,
                left: false,
            },
            RelayPayload::Chat { user, message } => {
                let Some(chat) = self.accept_chat(user_id, user, message, now) else {
                    return;
                };
                ServerEvent::ChatMessage(chat)
            }
            RelayPayload::Code { code, .. } => {
                if code.len() > self.settings.max_code_bytes {
                    warn!(
                        "Dropping code snapshot of {} bytes from user {}",
                        code.len(),
                        user_id
                    );
                    return;
                }
                ServerEvent::CodeUpdate {
                    code,
                    from: user_id,
                }
            }
            RelayPayload::Offer { sdp, .. } => {
                debug!("Relaying offer from user {}", user_id);
                ServerEvent::WebrtcOffer { sdp, from: user_id }
            }
            RelayPayload::Answer { sdp, .. } => {
                debug!("Relaying answer from user {}", user_id);
                ServerEvent::WebrtcAnswer { sdp, from: user_id }
            }
            RelayPayload::Ice { candidate, .. } => ServerEvent::WebrtcIce {
                candidate,
                from: user_id,
            },
        };

        self.broadcast(user_id, event).await;
    }

    fn accept_chat(
        &mut self,
        user_id: UserId,
        user: String,
        message: String,
        now: DateTime<Utc>,
    ) -> Option<ChatMessage> {
        if message.trim().is_empty() {
            debug!("Dropping empty chat message");
            return None;
        }

        let message = if message.chars().count() > self.settings.max_chat_len {
            message.chars().take(self.settings.max_chat_len).collect()
        } else {
            message
        };

        let user = if user.trim().is_empty() {
            user_id.display_label()
        } else {
            user
        };

        // Per-room ordering: timestamps never go backwards.
        let at = match self.last_chat_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_chat_at = Some(at);

        Some(ChatMessage::new(user, message, at))
    }

    /// Delivers to every member except `from`. No event ever returns to its origin.
    async fn broadcast(&self, from: UserId, event: ServerEvent) {
        for conn in self.state.peer_connections(from) {
            self.signaling.deliver(conn, event.clone()).await;
        }
    }

    async fn finalize_departure(&mut self, user_id: UserId) {
        // A user whose window was running has already been announced offline.
        let announced = self.grace_deadlines.remove(&user_id).is_some();
        let Some(role) = self.state.leave(user_id, Utc::now()) else {
            return;
        };
        info!("User {} left room {}", user_id, self.state.session_id());
        if announced {
            return;
        }
        self.broadcast(
            user_id,
            ServerEvent::PresenceUpdate {
                user_id,
                role,
                left: true,
            },
        )
        .await;
    }

    async fn expire_grace_windows(&mut self) {
        let now = Instant::now();
        let expired: Vec<UserId> = self
            .grace_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(user, _)| *user)
            .collect();

        for user_id in expired {
            info!(
                "Reconnect window for user {} in room {} expired",
                user_id,
                self.state.session_id()
            );
            self.finalize_departure(user_id).await;
        }
    }

    async fn activate_session(&self) {
        let id = self.state.session_id();
        match self.sessions.transition(id, SessionStatus::Active).await {
            Ok(_) => {}
            Err(DuetError::InvalidTransition { from, .. }) => {
                debug!("Session {} stays {}", id, from);
            }
            Err(e) => warn!("Failed to activate session {}: {}", id, e),
        }
    }
}
