use duet_core::{ClientEvent, ConnectionId, DenyReason, IceCandidate, Participant, Role, UserId};
use tokio::sync::oneshot;

/// Commands the signaling layer sends into a room task.
#[derive(Debug)]
pub enum RoomCommand {
    /// `join_room` that already passed the directory checks.
    Join {
        conn: ConnectionId,
        user_id: UserId,
        reply: oneshot::Sender<Result<Role, DenyReason>>,
    },

    /// Explicit exit. Final, the peer is told immediately.
    Leave { conn: ConnectionId },

    /// Socket closed. The seat is held for the reconnect grace period.
    Disconnect { conn: ConnectionId },

    /// Room-scoped event to fan out to the other member.
    Relay {
        conn: ConnectionId,
        payload: RelayPayload,
    },

    Snapshot {
        reply: oneshot::Sender<Vec<Participant>>,
    },
}

/// The part of a client event the room forwards. Sender identity is never taken
/// from the payload; `claimed_from` is kept only to log mismatches.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayPayload {
    Presence { left: bool },
    Chat { user: String, message: String },
    Code { code: String, claimed_from: UserId },
    Offer { sdp: String, claimed_from: UserId },
    Answer { sdp: String, claimed_from: UserId },
    Ice {
        candidate: IceCandidate,
        claimed_from: UserId,
    },
}

impl RelayPayload {
    /// `None` for events that are not relayed (join/leave).
    pub fn from_client(event: ClientEvent) -> Option<Self> {
        let payload = match event {
            ClientEvent::JoinRoom { .. } | ClientEvent::LeaveRoom { .. } => return None,
            ClientEvent::Presence { left, .. } => RelayPayload::Presence { left },
            ClientEvent::ChatMessage { user, message, .. } => RelayPayload::Chat { user, message },
            ClientEvent::CodeUpdate { code, from, .. } => RelayPayload::Code {
                code,
                claimed_from: from,
            },
            ClientEvent::WebrtcOffer { sdp, from, .. } => RelayPayload::Offer {
                sdp,
                claimed_from: from,
            },
            ClientEvent::WebrtcAnswer { sdp, from, .. } => RelayPayload::Answer {
                sdp,
                claimed_from: from,
            },
            ClientEvent::WebrtcIce {
                candidate, from, ..
            } => RelayPayload::Ice {
                candidate,
                claimed_from: from,
            },
        };
        Some(payload)
    }

    pub fn claimed_from(&self) -> Option<UserId> {
        match self {
            RelayPayload::Presence { .. } | RelayPayload::Chat { .. } => None,
            RelayPayload::Code { claimed_from, .. }
            | RelayPayload::Offer { claimed_from, .. }
            | RelayPayload::Answer { claimed_from, .. }
            | RelayPayload::Ice { claimed_from, .. } => Some(*claimed_from),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayPayload::Presence { .. } => "presence",
            RelayPayload::Chat { .. } => "chat_message",
            RelayPayload::Code { .. } => "code_update",
            RelayPayload::Offer { .. } => "webrtc_offer",
            RelayPayload::Answer { .. } => "webrtc_answer",
            RelayPayload::Ice { .. } => "webrtc_ice",
        }
    }
}
