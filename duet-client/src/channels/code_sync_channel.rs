use crate::signaling::SignalSink;
use duet_core::{ClientEvent, CodeSnapshot, DuetError, SessionId, UserId};
use std::sync::Arc;
use tracing::debug;

type ApplyHook = Box<dyn Fn(&CodeSnapshot) + Send + Sync>;

/// Shared editor buffer. Every edit broadcasts the whole document; the latest
/// snapshot to arrive replaces the buffer. Concurrent edits are not merged.
pub struct CodeSyncChannel {
    session_id: SessionId,
    self_id: UserId,
    signal: Arc<dyn SignalSink>,
    text: String,
    on_apply: Option<ApplyHook>,
}

impl CodeSyncChannel {
    pub fn new(session_id: SessionId, self_id: UserId, signal: Arc<dyn SignalSink>) -> Self {
        Self {
            session_id,
            self_id,
            signal,
            text: String::new(),
            on_apply: None,
        }
    }

    /// Called whenever a remote snapshot replaces the buffer.
    pub fn on_apply(&mut self, hook: impl Fn(&CodeSnapshot) + Send + Sync + 'static) {
        self.on_apply = Some(Box::new(hook));
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn local_edit(&mut self, text: impl Into<String>) -> Result<(), DuetError> {
        self.text = text.into();
        self.signal
            .send(ClientEvent::CodeUpdate {
                session_id: self.session_id.clone(),
                code: self.text.clone(),
                from: self.self_id,
            })
            .await
    }

    /// Applies a remote snapshot. Returns false for our own echo, which is never applied.
    pub fn receive(&mut self, code: String, from: UserId) -> bool {
        if from == self.self_id {
            debug!("Ignoring own code snapshot");
            return false;
        }

        let snapshot = CodeSnapshot {
            session_id: self.session_id.clone(),
            from_user_id: from,
            full_text: code,
        };
        if let Some(hook) = &self.on_apply {
            hook(&snapshot);
        }
        self.text = snapshot.full_text;
        true
    }
}
