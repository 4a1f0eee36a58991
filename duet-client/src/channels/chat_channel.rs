use crate::signaling::SignalSink;
use chrono::{DateTime, Utc};
use duet_core::{ChatMessage, ClientEvent, DuetError, SessionId};
use std::sync::Arc;
use tracing::debug;

/// Room chat. Lives as long as the interview; nothing is persisted.
///
/// The relay never echoes a message back, so sent messages are appended locally.
/// The list is kept in arrival order, which is the relay's per-room order for
/// everything received.
pub struct ChatChannel {
    session_id: SessionId,
    author: String,
    signal: Arc<dyn SignalSink>,
    messages: Vec<ChatMessage>,
}

impl ChatChannel {
    pub fn new(session_id: SessionId, author: impl Into<String>, signal: Arc<dyn SignalSink>) -> Self {
        Self {
            session_id,
            author: author.into(),
            signal,
            messages: Vec::new(),
        }
    }

    /// Sends `text` unless it is blank. Returns the locally appended message.
    pub async fn send(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<&ChatMessage>, DuetError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Not sending blank chat message");
            return Ok(None);
        }

        self.signal
            .send(ClientEvent::ChatMessage {
                session_id: self.session_id.clone(),
                user: self.author.clone(),
                message: text.to_owned(),
            })
            .await?;

        self.messages
            .push(ChatMessage::new(self.author.clone(), text, now));
        Ok(self.messages.last())
    }

    pub fn receive(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
