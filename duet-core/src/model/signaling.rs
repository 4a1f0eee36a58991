use crate::error::{DenyReason, DuetError};
use crate::model::chat::ChatMessage;
use crate::model::ids::{SessionId, UserId};
use crate::model::participant::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Response of the ICE config endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IceConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

/// Trickle ICE candidate, same JSON shape as the browser `RTCIceCandidateInit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerPresence {
    pub user_id: UserId,
    pub role: Role,
    pub online: bool,
}

/// Events a client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom {
        session_id: SessionId,
        user_id: UserId,
    },
    LeaveRoom {
        session_id: SessionId,
    },
    Presence {
        session_id: SessionId,
        user_id: UserId,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        left: bool,
    },
    ChatMessage {
        session_id: SessionId,
        user: String,
        message: String,
    },
    CodeUpdate {
        session_id: SessionId,
        code: String,
        from: UserId,
    },
    WebrtcOffer {
        session_id: SessionId,
        sdp: String,
        from: UserId,
    },
    WebrtcAnswer {
        session_id: SessionId,
        sdp: String,
        from: UserId,
    },
    WebrtcIce {
        session_id: SessionId,
        candidate: IceCandidate,
        from: UserId,
    },
}

impl ClientEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            ClientEvent::JoinRoom { session_id, .. }
            | ClientEvent::LeaveRoom { session_id }
            | ClientEvent::Presence { session_id, .. }
            | ClientEvent::ChatMessage { session_id, .. }
            | ClientEvent::CodeUpdate { session_id, .. }
            | ClientEvent::WebrtcOffer { session_id, .. }
            | ClientEvent::WebrtcAnswer { session_id, .. }
            | ClientEvent::WebrtcIce { session_id, .. } => session_id,
        }
    }

    pub fn decode(text: &str) -> Result<Self, DuetError> {
        serde_json::from_str(text).map_err(|e| DuetError::Validation(e.to_string()))
    }

    pub fn encode(&self) -> Result<String, DuetError> {
        serde_json::to_string(self).map_err(|e| DuetError::Validation(e.to_string()))
    }
}

/// Events the relay sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Joined {
        session_id: SessionId,
        user_id: UserId,
        role: Role,
        #[serde(default)]
        peer: Option<PeerPresence>,
    },
    JoinDenied {
        reason: DenyReason,
    },
    PresenceUpdate {
        user_id: UserId,
        role: Role,
        #[serde(default)]
        left: bool,
    },
    ChatMessage(ChatMessage),
    CodeUpdate {
        code: String,
        from: UserId,
    },
    WebrtcOffer {
        sdp: String,
        from: UserId,
    },
    WebrtcAnswer {
        sdp: String,
        from: UserId,
    },
    WebrtcIce {
        candidate: IceCandidate,
        from: UserId,
    },
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, DuetError> {
        serde_json::to_string(self).map_err(|e| DuetError::Validation(e.to_string()))
    }

    /// Single validation point for inbound relay frames on the client.
    ///
    /// Chat payloads that do not match the schema are coerced into a renderable
    /// message; any other malformed frame is rejected.
    pub fn decode_lenient(text: &str, now: DateTime<Utc>) -> Result<Self, DuetError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DuetError::Validation(e.to_string()))?;

        let is_chat = value.get("event").and_then(Value::as_str) == Some("chat_message");
        if is_chat {
            let data = value.get("data").unwrap_or(&Value::Null);
            return Ok(ServerEvent::ChatMessage(ChatMessage::coerce(data, now)));
        }

        serde_json::from_value(value).map_err(|e| DuetError::Validation(e.to_string()))
    }
}
