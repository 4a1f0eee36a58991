use crate::media::TrackKind;
use std::fmt;
use std::time::Duration;

/// Negotiation state of the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    #[default]
    Idle,
    Negotiating,
    Connected,
    /// Terminal. Reached only through `close`.
    Closed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerState::Idle => "idle",
            PeerState::Negotiating => "negotiating",
            PeerState::Connected => "connected",
            PeerState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What the UI needs to hear from the peer connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerUpdate {
    StateChanged(PeerState),
    RemoteTrack { id: String, kind: TrackKind },
    /// ICE failed; a fresh offer follows after `retry_in`.
    ConnectionFailed { retry_in: Duration },
}
