use crate::media::{LocalMedia, MediaConstraints, MediaFlags, MediaSource, MediaTrack, TrackKind};
use crate::peer::{PeerState, PeerUpdate};
use crate::signaling::SignalSink;
use crate::transport::{
    PeerTransport, TransportEvent, TransportFactory, TransportSignal, TransportState,
};
use duet_core::{ClientEvent, DuetError, IceCandidate, IceConfig, SessionId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Who this side is talking to and through what.
pub struct PeerContext {
    pub session_id: SessionId,
    pub self_id: UserId,
    pub peer_id: UserId,
    pub ice: IceConfig,
    pub retry_delay: Duration,
}

/// Per-participant negotiation state machine. Owns local media and the transport.
///
/// Glare is resolved with fixed roles: the participant with the lower user id is
/// polite. A polite side that receives an offer while its own is outstanding drops
/// that offer and answers: before the first connection by replacing the transport,
/// on a connected transport by rolling the local offer back. An impolite side ignores the incoming offer and
/// every candidate that belongs to it.
pub struct PeerConnectionManager {
    ctx: PeerContext,
    factory: Arc<dyn TransportFactory>,
    media_source: Arc<dyn MediaSource>,
    signal: Arc<dyn SignalSink>,

    state: PeerState,
    transport: Option<Arc<dyn PeerTransport>>,
    generation: u64,
    events_tx: mpsc::UnboundedSender<TransportSignal>,

    local_media: Option<LocalMedia>,
    screen: Option<LocalMedia>,

    making_offer: bool,
    ignoring_offer: bool,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
    retry_at: Option<Instant>,
}

impl PeerConnectionManager {
    pub fn new(
        ctx: PeerContext,
        factory: Arc<dyn TransportFactory>,
        media_source: Arc<dyn MediaSource>,
        signal: Arc<dyn SignalSink>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportSignal>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            ctx,
            factory,
            media_source,
            signal,
            state: PeerState::Idle,
            transport: None,
            generation: 0,
            events_tx,
            local_media: None,
            screen: None,
            making_offer: false,
            ignoring_offer: false,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            retry_at: None,
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn is_polite(&self) -> bool {
        self.ctx.self_id < self.ctx.peer_id
    }

    pub fn media_flags(&self) -> MediaFlags {
        self.local_media
            .as_ref()
            .map(LocalMedia::flags)
            .unwrap_or_default()
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// When a failed connection should be retried, if one is scheduled.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Acquires camera and microphone and starts negotiating. Media failure leaves
    /// the manager idle with all media flags off.
    pub async fn activate_video(&mut self, constraints: MediaConstraints) -> Result<(), DuetError> {
        self.ensure_open()?;

        if self.local_media.is_none() {
            let tracks = match self.media_source.user_media(constraints).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    warn!("Local media unavailable: {}", e);
                    return Err(e);
                }
            };
            info!("Acquired {} local tracks", tracks.len());
            self.local_media = Some(LocalMedia::new(tracks));
        }

        let transport = self.ensure_transport().await?;
        if let Some(media) = &self.local_media {
            attach(&transport, media.tracks()).await?;
        }
        self.make_offer().await
    }

    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        if let Some(media) = &self.local_media {
            media.set_enabled(kind, enabled);
        }
    }

    /// Starts or stops screen sharing. Returns whether sharing is now on.
    pub async fn toggle_screen_share(&mut self) -> Result<bool, DuetError> {
        self.ensure_open()?;

        if let Some(mut screen) = self.screen.take() {
            if let Some(transport) = self.transport.clone() {
                if let Err(e) = transport.remove_tracks(screen.tracks()).await {
                    warn!("Failed to detach screen share: {:#}", e);
                }
                screen.stop();
                self.make_offer().await?;
            }
            info!("Screen share stopped");
            return Ok(false);
        }

        let screen = LocalMedia::new(self.media_source.display_media().await?);
        if let Some(transport) = self.transport.clone() {
            attach(&transport, screen.tracks()).await?;
            self.screen = Some(screen);
            self.make_offer().await?;
        } else {
            self.screen = Some(screen);
        }
        info!("Screen share started");
        Ok(true)
    }

    pub async fn handle_offer(&mut self, from: UserId, sdp: String) -> Result<(), DuetError> {
        if !self.accepts_from(from) {
            return Ok(());
        }

        let collision = self.making_offer;
        self.ignoring_offer = collision && !self.is_polite();
        if self.ignoring_offer {
            info!("Offer collision: keeping own offer, ignoring user {}", from);
            return Ok(());
        }
        if collision {
            info!("Offer collision: rolling back own offer for user {}", from);
            self.rollback_own_offer().await;
        }

        let transport = self.ensure_transport().await?;
        if let Err(e) = transport.set_remote_offer(sdp).await {
            self.teardown_transport().await;
            return Err(DuetError::Signaling(format!("remote offer rejected: {e:#}")));
        }
        self.remote_description_set = true;
        self.flush_pending_candidates(&transport).await;

        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.teardown_transport().await;
                return Err(DuetError::Signaling(format!("answer failed: {e:#}")));
            }
        };
        self.signal
            .send(ClientEvent::WebrtcAnswer {
                session_id: self.ctx.session_id.clone(),
                sdp: answer,
                from: self.ctx.self_id,
            })
            .await?;

        if self.state != PeerState::Connected {
            self.state = PeerState::Negotiating;
        }
        Ok(())
    }

    pub async fn handle_answer(&mut self, from: UserId, sdp: String) -> Result<(), DuetError> {
        if !self.accepts_from(from) {
            return Ok(());
        }
        let Some(transport) = self.transport.clone().filter(|_| self.making_offer) else {
            debug!("Ignoring answer with no outstanding offer");
            return Ok(());
        };

        if let Err(e) = transport.set_remote_answer(sdp).await {
            self.teardown_transport().await;
            return Err(DuetError::Signaling(format!("remote answer rejected: {e:#}")));
        }
        self.making_offer = false;
        self.ignoring_offer = false;
        self.remote_description_set = true;
        self.flush_pending_candidates(&transport).await;
        Ok(())
    }

    /// Applies a remote candidate, or buffers it until the remote description is set.
    pub async fn handle_ice(&mut self, from: UserId, candidate: IceCandidate) {
        if !self.accepts_from(from) {
            return;
        }
        if self.ignoring_offer {
            debug!("Dropping candidate of an ignored offer");
            return;
        }

        match self.transport.clone() {
            Some(transport) if self.remote_description_set => {
                if let Err(e) = transport.add_ice_candidate(candidate).await {
                    warn!("Failed to apply remote candidate: {:#}", e);
                }
            }
            _ => self.pending_candidates.push(candidate),
        }
    }

    pub async fn on_transport_event(&mut self, signal: TransportSignal) -> Option<PeerUpdate> {
        if signal.generation != self.generation || self.transport.is_none() {
            debug!("Dropping event of retired transport {}", signal.generation);
            return None;
        }

        match signal.event {
            TransportEvent::CandidateGenerated(candidate) => {
                let event = ClientEvent::WebrtcIce {
                    session_id: self.ctx.session_id.clone(),
                    candidate,
                    from: self.ctx.self_id,
                };
                if let Err(e) = self.signal.send(event).await {
                    warn!("Failed to forward local candidate: {}", e);
                }
                None
            }
            TransportEvent::StateChanged(TransportState::Connected) => {
                self.retry_at = None;
                self.set_state(PeerState::Connected)
            }
            TransportEvent::StateChanged(TransportState::Failed) => {
                warn!(
                    "Connection to user {} failed, retrying in {:?}",
                    self.ctx.peer_id, self.ctx.retry_delay
                );
                self.retry_at = Some(Instant::now() + self.ctx.retry_delay);
                self.state = PeerState::Negotiating;
                Some(PeerUpdate::ConnectionFailed {
                    retry_in: self.ctx.retry_delay,
                })
            }
            TransportEvent::StateChanged(other) => {
                debug!("Transport state {:?}", other);
                None
            }
            TransportEvent::RemoteTrack { id, kind } => Some(PeerUpdate::RemoteTrack { id, kind }),
        }
    }

    /// Replaces a failed connection with a fresh one and offers again.
    pub async fn retry_now(&mut self) -> Result<(), DuetError> {
        if self.retry_at.take().is_none() || self.state == PeerState::Closed {
            return Ok(());
        }
        info!("Retrying connection to user {}", self.ctx.peer_id);
        self.teardown_transport().await;
        self.make_offer().await
    }

    /// The peer left the room. Local media stays so a later rejoin can renegotiate.
    pub async fn peer_left(&mut self) -> Option<PeerUpdate> {
        if self.state == PeerState::Closed {
            return None;
        }
        self.teardown_transport().await;
        self.set_state(PeerState::Idle)
    }

    /// Closes the connection and releases every local track. Idempotent.
    pub async fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.teardown_transport().await;
        self.release_media();
        self.state = PeerState::Closed;
        info!("Peer connection manager closed");
    }

    pub fn release_media(&mut self) {
        if let Some(mut screen) = self.screen.take() {
            screen.stop();
        }
        if let Some(mut media) = self.local_media.take() {
            media.stop();
        }
    }

    async fn make_offer(&mut self) -> Result<(), DuetError> {
        let transport = self.ensure_transport().await?;
        self.making_offer = true;

        let sdp = match transport.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.teardown_transport().await;
                return Err(DuetError::Signaling(format!("offer failed: {e:#}")));
            }
        };
        self.signal
            .send(ClientEvent::WebrtcOffer {
                session_id: self.ctx.session_id.clone(),
                sdp,
                from: self.ctx.self_id,
            })
            .await?;

        if self.state != PeerState::Connected {
            self.state = PeerState::Negotiating;
        }
        Ok(())
    }

    /// Renegotiation glare keeps the live connection; only the offer goes away.
    async fn rollback_own_offer(&mut self) {
        let live = self
            .transport
            .clone()
            .filter(|_| self.state == PeerState::Connected);
        let Some(transport) = live else {
            self.teardown_transport().await;
            return;
        };
        match transport.rollback_local_offer().await {
            Ok(()) => self.making_offer = false,
            Err(e) => {
                warn!("Rollback failed, replacing transport: {:#}", e);
                self.teardown_transport().await;
            }
        }
    }

    async fn ensure_transport(&mut self) -> Result<Arc<dyn PeerTransport>, DuetError> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }

        self.generation += 1;
        let transport = self
            .factory
            .create(&self.ctx.ice, self.generation, self.events_tx.clone())
            .await
            .map_err(|e| DuetError::Signaling(format!("transport setup failed: {e:#}")))?;
        debug!("Created transport generation {}", self.generation);

        let mut tracks: Vec<MediaTrack> = Vec::new();
        for media in [&self.local_media, &self.screen].into_iter().flatten() {
            tracks.extend(media.tracks().iter().cloned());
        }
        attach(&transport, &tracks).await?;

        self.transport = Some(transport.clone());
        self.remote_description_set = false;
        if self.state == PeerState::Connected {
            // A replacement transport has not connected yet.
            self.state = PeerState::Negotiating;
        }
        Ok(transport)
    }

    /// Closes the current transport. Nothing of it survives: no pending offer,
    /// no buffered candidates, no scheduled retry.
    async fn teardown_transport(&mut self) {
        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            warn!("Failed to close transport: {:#}", e);
        }
        self.making_offer = false;
        self.ignoring_offer = false;
        self.remote_description_set = false;
        self.pending_candidates.clear();
        self.retry_at = None;
    }

    async fn flush_pending_candidates(&mut self, transport: &Arc<dyn PeerTransport>) {
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to apply buffered candidate: {:#}", e);
            }
        }
    }

    fn accepts_from(&self, from: UserId) -> bool {
        if self.state == PeerState::Closed {
            return false;
        }
        if from != self.ctx.peer_id {
            warn!("Ignoring signal from unexpected user {}", from);
            return false;
        }
        true
    }

    fn ensure_open(&self) -> Result<(), DuetError> {
        if self.state == PeerState::Closed {
            return Err(DuetError::Signaling("peer connection is closed".into()));
        }
        Ok(())
    }

    fn set_state(&mut self, state: PeerState) -> Option<PeerUpdate> {
        if self.state == state {
            return None;
        }
        info!("Peer state {} -> {}", self.state, state);
        self.state = state;
        Some(PeerUpdate::StateChanged(state))
    }
}

async fn attach(transport: &Arc<dyn PeerTransport>, tracks: &[MediaTrack]) -> Result<(), DuetError> {
    if tracks.is_empty() {
        return Ok(());
    }
    transport
        .add_tracks(tracks)
        .await
        .map_err(|e| DuetError::Signaling(format!("failed to attach tracks: {e:#}")))
}
