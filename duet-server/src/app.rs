use crate::api;
use crate::config::ServerConfig;
use crate::ice::IceConfigProvider;
use crate::room::{RoomManager, RoomSettings};
use crate::sessions::{FeedbackStore, InMemorySessions, SessionDirectory, SessionService};
use crate::signaling::{SignalingService, ws_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use duet_core::Session;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared by every handler: open sockets, live rooms, the session API and ICE issuance.
pub struct AppState {
    pub signaling: SignalingService,
    pub room_manager: RoomManager,
    pub sessions: SessionService,
    pub ice: IceConfigProvider,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        settings: RoomSettings,
        ice: IceConfigProvider,
    ) -> Self {
        let signaling = SignalingService::new();
        let room_manager =
            RoomManager::new(directory.clone(), Arc::new(signaling.clone()), settings);
        let sessions = SessionService::new(directory, Arc::new(FeedbackStore::new()));

        Self {
            signaling,
            room_manager,
            sessions,
            ice,
        }
    }

    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let sessions = match &config.sessions_file {
            Some(path) => load_sessions(path).await?,
            None => Vec::new(),
        };
        info!("Loaded {} scheduled sessions", sessions.len());

        Ok(Self::new(
            Arc::new(InMemorySessions::with_sessions(sessions)),
            config.room_settings(),
            config.ice_provider(),
        ))
    }
}

async fn load_sessions(path: &Path) -> Result<Vec<Session>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read sessions file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse sessions file {}", path.display()))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(api::health))
        .route("/api/sessions", post(api::create_session))
        .route("/api/sessions/{id}", get(api::get_session))
        .route("/api/sessions/{id}/complete", post(api::complete_session))
        .route("/api/sessions/{id}/feedback", post(api::submit_feedback))
        .route("/api/ice-config", get(api::ice_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
