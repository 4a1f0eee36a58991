use crate::media::TrackKind;
use duet_core::IceCandidate;

/// Connection state as reported by the underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a transport raises for the peer connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Local trickle candidate to forward over the relay.
    CandidateGenerated(IceCandidate),

    StateChanged(TransportState),

    /// Remote media arrived.
    RemoteTrack { id: String, kind: TrackKind },
}

/// A transport event tagged with the transport that produced it. Events of a
/// torn-down transport carry an old generation and are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSignal {
    pub generation: u64,
    pub event: TransportEvent,
}
