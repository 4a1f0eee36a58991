use async_trait::async_trait;
use duet_core::{ClientEvent, DuetError};

/// Outbound half of the relay channel.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<(), DuetError>;

    /// Closes the channel. Later sends fail with `NetworkDisconnect`.
    async fn disconnect(&self);
}
