
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

use duet_core::{Session, SessionId};
use duet_server::{
    AppState, IceConfigProvider, InMemorySessions, RoomManager, RoomSettings, build_router,
};

use crate::utils::{Delivered, MockSignalingOutput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub struct TestRegistry {
    pub manager: RoomManager,
    pub sessions: Arc<InMemorySessions>,
    pub signaling: MockSignalingOutput,
    pub rx: mpsc::UnboundedReceiver<Delivered>,
}

impl TestRegistry {
    /// Round-trips through the room so every command sent before it has been applied.
    pub async fn settle(&self, session_id: &SessionId) {
        let _ = self.manager.participants(session_id).await;
    }
}

pub fn create_test_registry(sessions: Vec<Session>, settings: RoomSettings) -> TestRegistry {
    let (signaling, rx) = MockSignalingOutput::new();
    let directory = Arc::new(InMemorySessions::with_sessions(sessions));
    let manager = RoomManager::new(directory.clone(), Arc::new(signaling.clone()), settings);

    TestRegistry {
        manager,
        sessions: directory,
        signaling,
        rx,
    }
}

/// Serves the full router on an ephemeral port.
pub async fn spawn_server(sessions: Vec<Session>, settings: RoomSettings) -> SocketAddr {
    let state = Arc::new(AppState::new(
        Arc::new(InMemorySessions::with_sessions(sessions)),
        settings,
        IceConfigProvider::default(),
    ));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server error");
    });

    addr
}
