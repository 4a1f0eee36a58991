use async_trait::async_trait;
use duet_core::{ConnectionId, ServerEvent};

/// Outbound side of the relay. Rooms and the manager talk to clients only through it.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue an event for one connection. Unknown connections are skipped.
    async fn deliver(&self, conn: ConnectionId, event: ServerEvent);
}
