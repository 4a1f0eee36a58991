use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use duet_core::{ConnectionId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

/// Registry of open relay sockets, keyed by connection.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
            }),
        }
    }

    pub fn add_connection(&self, conn: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(conn, tx);
    }

    pub fn remove_connection(&self, conn: &ConnectionId) {
        self.inner.connections.remove(conn);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn send_event(&self, conn: ConnectionId, event: &ServerEvent) {
        let Some(socket) = self.inner.connections.get(&conn) else {
            warn!("Attempted to send event to closed connection {}", conn);
            return;
        };
        match event.encode() {
            Ok(json) => {
                if let Err(e) = socket.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", conn, e);
                }
            }
            Err(e) => error!("Failed to serialize relay event: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(&self, conn: ConnectionId, event: ServerEvent) {
        self.send_event(conn, &event);
    }
}
