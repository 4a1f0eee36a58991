use crate::media::MediaTrack;
use crate::transport::TransportSignal;
use anyhow::Result;
use async_trait::async_trait;
use duet_core::{IceCandidate, IceConfig};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One RTCPeerConnection-like object. Never reused after `close`.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Creates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<String>;

    /// Drops the outstanding local offer and returns to the stable state. The
    /// connection and its current descriptions stay in place.
    async fn rollback_local_offer(&self) -> Result<()>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Tracks that are already attached are skipped.
    async fn add_tracks(&self, tracks: &[MediaTrack]) -> Result<()>;

    async fn remove_tracks(&self, tracks: &[MediaTrack]) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        ice: &IceConfig,
        generation: u64,
        events: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
