use crate::media::{MediaTrack, TrackKind};
use crate::transport::{
    PeerTransport, TransportEvent, TransportFactory, TransportSignal, TransportState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use duet_core::{IceCandidate, IceConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// `PeerTransport` backed by a webrtc-rs peer connection.
pub struct RtcTransport {
    generation: u64,
    peer_connection: Arc<RTCPeerConnection>,
    local_tracks: Mutex<HashMap<String, LocalTrack>>,
}

struct LocalTrack {
    sample_track: Arc<TrackLocalStaticSample>,
    sender: Arc<RTCRtpSender>,
}

impl RtcTransport {
    pub async fn new(
        ice: &IceConfig,
        generation: u64,
        event_tx: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice
                .ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let emit = move |tx: &mpsc::UnboundedSender<TransportSignal>, event| {
            let _ = tx.send(TransportSignal { generation, event });
        };

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed (gen {}): {:?}", generation, s);
                    let state = match s {
                        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => {
                            TransportState::New
                        }
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                    };
                    emit(&tx, TransportEvent::StateChanged(state));
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                emit(
                    &tx,
                    TransportEvent::CandidateGenerated(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }),
                );
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let tx = track_tx.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    _ => TrackKind::Video,
                };
                debug!("Remote {:?} track {} arrived", kind, track.id());
                emit(
                    &tx,
                    TransportEvent::RemoteTrack {
                        id: track.id(),
                        kind,
                    },
                );
            })
        }));

        Ok(Self {
            generation,
            peer_connection,
            local_tracks: Mutex::new(HashMap::new()),
        })
    }

    /// Sample sink of a local track; the capture pipeline writes encoded frames here.
    pub async fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.local_tracks
            .lock()
            .await
            .get(track_id)
            .map(|t| t.sample_track.clone())
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local offer")?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local answer")?;
        Ok(answer.sdp)
    }

    async fn rollback_local_offer(&self) -> Result<()> {
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };
        // No public constructor for a rollback description; go through its JSON form.
        let rollback: RTCSessionDescription =
            serde_json::from_value(serde_json::json!({ "type": "rollback", "sdp": pending.sdp }))?;
        self.peer_connection
            .set_local_description(rollback)
            .await
            .context("Failed to roll back local offer")?;
        Ok(())
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn add_tracks(&self, tracks: &[MediaTrack]) -> Result<()> {
        let mut local = self.local_tracks.lock().await;
        for track in tracks {
            if local.contains_key(track.id()) {
                continue;
            }
            let mime_type = match track.kind() {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let sample_track = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id().to_owned(),
                format!("duet-{}", self.generation),
            ));
            let sender = self
                .peer_connection
                .add_track(sample_track.clone() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("Failed to add track {}", track.id()))?;
            local.insert(
                track.id().to_owned(),
                LocalTrack {
                    sample_track,
                    sender,
                },
            );
        }
        Ok(())
    }

    async fn remove_tracks(&self, tracks: &[MediaTrack]) -> Result<()> {
        let mut local = self.local_tracks.lock().await;
        for track in tracks {
            if let Some(entry) = local.remove(track.id()) {
                self.peer_connection
                    .remove_track(&entry.sender)
                    .await
                    .with_context(|| format!("Failed to remove track {}", track.id()))?;
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.local_tracks.lock().await.clear();
        self.peer_connection.close().await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        ice: &IceConfig,
        generation: u64,
        events: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<Arc<dyn PeerTransport>> {
        Ok(Arc::new(RtcTransport::new(ice, generation, events).await?))
    }
}
