use crate::channels::{ChatChannel, CodeSyncChannel};
use crate::config::ClientConfig;
use crate::lifecycle::{
    ClockStore, FileClockStore, HttpSessionApi, LifecycleController, SessionApi, SessionClock,
};
use crate::media::{MediaConstraints, MediaFlags, MediaSource, SyntheticMediaSource, TrackKind};
use crate::peer::{PeerConnectionManager, PeerContext, PeerState, PeerUpdate};
use crate::signaling::{RelayClient, SignalSink};
use crate::transport::{RtcTransportFactory, TransportFactory, TransportSignal};
use chrono::Utc;
use duet_core::utils::default_stun_urls;
use duet_core::{
    ChatMessage, ClientEvent, DenyReason, DuetError, Feedback, IceConfig, IceServerConfig, Role,
    ServerEvent, Session, SessionId, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How the two participants see each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConferenceMode {
    #[default]
    PeerToPeer,
    /// Embedded room of the external provider. The relay is never opened.
    External,
}

/// Collaborators an interview is built from.
#[derive(Clone)]
pub struct InterviewDeps {
    pub api: Arc<dyn SessionApi>,
    pub transport_factory: Arc<dyn TransportFactory>,
    pub media_source: Arc<dyn MediaSource>,
    pub clock_store: Arc<dyn ClockStore>,
}

impl InterviewDeps {
    /// HTTP session API, webrtc transport, on-disk clock and placeholder media.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            api: Arc::new(HttpSessionApi::new(config.api_base_url.clone())),
            transport_factory: Arc::new(RtcTransportFactory),
            media_source: Arc::new(SyntheticMediaSource),
            clock_store: Arc::new(FileClockStore::new(config.clock_store_dir.clone())),
        }
    }
}

pub enum InterviewLaunch {
    External { url: String },
    Live(Box<Interview>),
}

#[derive(Debug)]
pub enum InterviewUpdate {
    PeerPresence { user_id: UserId, role: Role, online: bool },
    Chat(ChatMessage),
    Code(String),
    Peer(PeerUpdate),
    /// Non-fatal failure; the interview keeps running.
    Warning(DuetError),
    /// Fatal; the view should leave the interview.
    Ended(DuetError),
}

/// One participant's live interview: relay channel, peer connection, chat, code, clock.
pub struct Interview {
    lifecycle: LifecycleController,
    role: Role,
    signal: Arc<dyn SignalSink>,
    inbound: mpsc::UnboundedReceiver<ServerEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportSignal>,
    peer: PeerConnectionManager,
    chat: ChatChannel,
    code: CodeSyncChannel,
    peer_online: bool,
    exited: bool,
}

impl Interview {
    /// Loads the session, checks the join window and enters the room (or hands back
    /// the external room URL).
    pub async fn launch(
        config: &ClientConfig,
        deps: InterviewDeps,
        session_id: &SessionId,
        user_id: UserId,
        early_consent: bool,
        mode: ConferenceMode,
    ) -> Result<InterviewLaunch, DuetError> {
        let clock = SessionClock::new(session_id.clone(), deps.clock_store.clone());
        let lifecycle = LifecycleController::load(
            session_id,
            user_id,
            deps.api.clone(),
            clock,
            config.join_lead,
        )
        .await?;
        lifecycle.check_join(Utc::now(), early_consent)?;

        if mode == ConferenceMode::External {
            let url = external_room_url(config, lifecycle.session())?;
            info!("Using external room for session {}", session_id);
            return Ok(InterviewLaunch::External { url });
        }

        let (relay, inbound) = RelayClient::connect(&config.relay_url)
            .await
            .map_err(|e| DuetError::NetworkDisconnect(format!("{e:#}")))?;
        let interview = Self::join(config, deps, lifecycle, Arc::new(relay), inbound).await?;
        Ok(InterviewLaunch::Live(Box::new(interview)))
    }

    /// Sends `join_room` over an open relay channel and waits for the verdict.
    pub async fn join(
        config: &ClientConfig,
        deps: InterviewDeps,
        mut lifecycle: LifecycleController,
        signal: Arc<dyn SignalSink>,
        mut inbound: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> Result<Self, DuetError> {
        let session = lifecycle.session().clone();
        let self_id = lifecycle.self_id();
        let Some(peer_id) = session.counterpart_of(self_id) else {
            return Err(DuetError::Authorization(DenyReason::NotAParticipant));
        };

        signal
            .send(ClientEvent::JoinRoom {
                session_id: session.id.clone(),
                user_id: self_id,
            })
            .await?;

        let (role, peer_online) = match await_join(&mut inbound, config.join_timeout).await {
            Ok(joined) => joined,
            Err(e) => {
                signal.disconnect().await;
                return Err(e);
            }
        };
        info!("Joined session {} as {}", session.id, role);
        lifecycle.on_joined(Utc::now());

        let ice = match deps.api.get_ice_config(self_id).await {
            Ok(ice) => ice,
            Err(e) => {
                warn!("ICE config unavailable, using public STUN: {}", e);
                IceConfig {
                    ice_servers: vec![IceServerConfig {
                        urls: default_stun_urls(),
                        username: None,
                        credential: None,
                    }],
                }
            }
        };

        let (peer, transport_rx) = PeerConnectionManager::new(
            PeerContext {
                session_id: session.id.clone(),
                self_id,
                peer_id,
                ice,
                retry_delay: config.retry_delay,
            },
            deps.transport_factory,
            deps.media_source,
            signal.clone(),
        );

        Ok(Self {
            chat: ChatChannel::new(session.id.clone(), self_id.display_label(), signal.clone()),
            code: CodeSyncChannel::new(session.id.clone(), self_id, signal.clone()),
            lifecycle,
            role,
            signal,
            inbound,
            transport_rx,
            peer,
            peer_online,
            exited: false,
        })
    }

    pub fn session(&self) -> &Session {
        self.lifecycle.session()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_peer_online(&self) -> bool {
        self.peer_online
    }

    pub fn peer_state(&self) -> PeerState {
        self.peer.state()
    }

    pub fn media_flags(&self) -> MediaFlags {
        self.peer.media_flags()
    }

    pub fn chat_messages(&self) -> &[ChatMessage] {
        self.chat.messages()
    }

    pub fn code(&self) -> &str {
        self.code.text()
    }

    pub fn code_channel_mut(&mut self) -> &mut CodeSyncChannel {
        &mut self.code
    }

    pub fn elapsed(&self) -> Duration {
        self.lifecycle.elapsed(Utc::now())
    }

    /// Waits for the next thing the UI should show. `None` once the interview has exited.
    pub async fn next_update(&mut self) -> Option<InterviewUpdate> {
        while !self.exited {
            let retry_at = self.peer.retry_deadline();

            tokio::select! {
                event = self.inbound.recv() => {
                    let Some(event) = event else {
                        warn!("Relay channel closed");
                        return Some(InterviewUpdate::Ended(DuetError::NetworkDisconnect(
                            "relay channel closed".into(),
                        )));
                    };
                    if let Some(update) = self.handle_server_event(event).await {
                        return Some(update);
                    }
                }

                Some(signal) = self.transport_rx.recv() => {
                    if let Some(update) = self.peer.on_transport_event(signal).await {
                        return Some(InterviewUpdate::Peer(update));
                    }
                }

                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(tokio::time::Instant::now)),
                    if retry_at.is_some() => {
                    if let Err(e) = self.peer.retry_now().await {
                        return Some(InterviewUpdate::Warning(e));
                    }
                }
            }
        }
        None
    }

    pub async fn handle_server_event(&mut self, event: ServerEvent) -> Option<InterviewUpdate> {
        let peer_id = self.session().counterpart_of(self.lifecycle.self_id())?;

        match event {
            ServerEvent::Joined { .. } => {
                debug!("Join acknowledged again");
                None
            }
            ServerEvent::JoinDenied { reason } => {
                error!("Relay revoked membership: {}", reason);
                Some(InterviewUpdate::Ended(DuetError::Authorization(reason)))
            }
            ServerEvent::PresenceUpdate {
                user_id,
                role,
                left,
            } => {
                if user_id != peer_id {
                    return None;
                }
                self.peer_online = !left;
                if left && let Some(update) = self.peer.peer_left().await {
                    debug!("Peer connection reset: {:?}", update);
                }
                Some(InterviewUpdate::PeerPresence {
                    user_id,
                    role,
                    online: !left,
                })
            }
            ServerEvent::ChatMessage(message) => {
                self.chat.receive(message.clone());
                Some(InterviewUpdate::Chat(message))
            }
            ServerEvent::CodeUpdate { code, from } => self
                .code
                .receive(code, from)
                .then(|| InterviewUpdate::Code(self.code.text().to_owned())),
            ServerEvent::WebrtcOffer { sdp, from } => self
                .peer
                .handle_offer(from, sdp)
                .await
                .err()
                .map(InterviewUpdate::Warning),
            ServerEvent::WebrtcAnswer { sdp, from } => self
                .peer
                .handle_answer(from, sdp)
                .await
                .err()
                .map(InterviewUpdate::Warning),
            ServerEvent::WebrtcIce { candidate, from } => {
                self.peer.handle_ice(from, candidate).await;
                None
            }
        }
    }

    pub async fn send_chat(&mut self, text: &str) -> Result<(), DuetError> {
        self.chat.send(text, Utc::now()).await.map(|_| ())
    }

    pub async fn edit_code(&mut self, text: impl Into<String>) -> Result<(), DuetError> {
        self.code.local_edit(text).await
    }

    pub async fn activate_video(&mut self) -> Result<(), DuetError> {
        self.peer.activate_video(MediaConstraints::default()).await
    }

    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        self.peer.set_track_enabled(kind, enabled);
    }

    pub async fn toggle_screen_share(&mut self) -> Result<bool, DuetError> {
        self.peer.toggle_screen_share().await
    }

    pub async fn complete(&mut self) -> Result<&Session, DuetError> {
        self.lifecycle.complete().await
    }

    pub fn can_submit_feedback(&self) -> bool {
        self.lifecycle.can_submit_feedback()
    }

    pub async fn submit_feedback(
        &mut self,
        rating: u8,
        comments: &str,
    ) -> Result<Feedback, DuetError> {
        self.lifecycle.submit_feedback(rating, comments).await
    }

    /// Leaves the interview. Order: stop the clock, disconnect the relay, close the
    /// peer connection, release local and screen media, clear the persisted clock.
    pub async fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        let session_id = self.session().id.clone();

        self.lifecycle.clock_mut().stop(Utc::now());

        if let Err(e) = self
            .signal
            .send(ClientEvent::LeaveRoom {
                session_id: session_id.clone(),
            })
            .await
        {
            debug!("Leave not delivered: {}", e);
        }
        self.signal.disconnect().await;

        // Closes the transport first, then stops camera, microphone and screen tracks.
        self.peer.close().await;

        self.lifecycle.clock_mut().clear();
        info!("Left interview {}", session_id);
    }
}

async fn await_join(
    inbound: &mut mpsc::UnboundedReceiver<ServerEvent>,
    timeout: Duration,
) -> Result<(Role, bool), DuetError> {
    let verdict = tokio::time::timeout(timeout, async {
        while let Some(event) = inbound.recv().await {
            match event {
                ServerEvent::Joined { role, peer, .. } => {
                    return Ok((role, peer.is_some_and(|p| p.online)));
                }
                ServerEvent::JoinDenied { reason } => {
                    return Err(DuetError::Authorization(reason));
                }
                other => debug!("Ignoring {:?} before join", other),
            }
        }
        Err(DuetError::NetworkDisconnect("relay closed before join".into()))
    })
    .await;

    verdict.unwrap_or_else(|_| Err(DuetError::NetworkDisconnect("join timed out".into())))
}

fn external_room_url(config: &ClientConfig, session: &Session) -> Result<String, DuetError> {
    let token = session
        .room_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DuetError::Validation("session has no external room".into()))?;
    Ok(format!(
        "{}/{}",
        config.external_room_base_url.trim_end_matches('/'),
        token
    ))
}
