use async_trait::async_trait;
use duet_core::{ConnectionId, ServerEvent};
use duet_server::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

pub type Delivered = (ConnectionId, ServerEvent);

/// Mock SignalingOutput that captures every delivery.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<Delivered>,
    delivered: Arc<Mutex<Vec<Delivered>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            delivered: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    /// Everything delivered to `conn` so far, in order.
    pub async fn events_for(&self, conn: ConnectionId) -> Vec<ServerEvent> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|(c, _)| *c == conn)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn deliver(&self, conn: ConnectionId, event: ServerEvent) {
        tracing::debug!("[MockSignaling] deliver to {}: {:?}", conn, event);
        self.delivered.lock().await.push((conn, event.clone()));
        let _ = self.tx.send((conn, event));
    }
}

/// Takes whatever is already queued without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Delivered>) -> Vec<Delivered> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

pub fn only_for(delivered: &[Delivered], conn: ConnectionId) -> Vec<ServerEvent> {
    delivered
        .iter()
        .filter(|(c, _)| *c == conn)
        .map(|(_, e)| e.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_core::DenyReason;

    #[tokio::test]
    async fn test_mock_signaling_captures_deliveries() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let conn = ConnectionId::new();
        let event = ServerEvent::JoinDenied {
            reason: DenyReason::SessionClosed,
        };

        signaling.deliver(conn, event.clone()).await;

        assert_eq!(rx.recv().await, Some((conn, event.clone())));
        assert_eq!(signaling.events_for(conn).await, vec![event]);
        assert!(signaling.events_for(ConnectionId::new()).await.is_empty());
    }
}
