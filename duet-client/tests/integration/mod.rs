pub mod interview_tests;
pub mod lifecycle_tests;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use duet_client::{
    ClientConfig, ClockStore, InterviewDeps, MemoryClockStore, PeerConnectionManager, PeerContext,
    PeerUpdate, TransportSignal,
};
use duet_core::{IceConfig, SessionId, UserId};

use crate::utils::{Journal, MockMediaSource, MockSessionApi, MockTransportFactory, RecordingSink};

pub const RETRY_DELAY: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// One side of a call with every collaborator mocked.
pub struct PeerHarness {
    pub manager: PeerConnectionManager,
    pub events: mpsc::UnboundedReceiver<TransportSignal>,
    pub factory: MockTransportFactory,
    pub media: Arc<MockMediaSource>,
    pub sink: Arc<RecordingSink>,
    pub journal: Journal,
}

impl PeerHarness {
    pub fn new(self_id: UserId, peer_id: UserId) -> Self {
        let journal = Journal::new();
        let factory = MockTransportFactory::new(journal.clone());
        let media = Arc::new(MockMediaSource::new(journal.clone()));
        let sink = Arc::new(RecordingSink::new(journal.clone()));

        let (manager, events) = PeerConnectionManager::new(
            PeerContext {
                session_id: SessionId::from("S1"),
                self_id,
                peer_id,
                ice: IceConfig::default(),
                retry_delay: RETRY_DELAY,
            },
            Arc::new(factory.clone()),
            media.clone(),
            sink.clone(),
        );

        Self {
            manager,
            events,
            factory,
            media,
            sink,
            journal,
        }
    }

    /// Feeds every queued transport event to the manager.
    pub async fn pump(&mut self) -> Vec<PeerUpdate> {
        let mut updates = Vec::new();
        while let Ok(signal) = self.events.try_recv() {
            if let Some(update) = self.manager.on_transport_event(signal).await {
                updates.push(update);
            }
        }
        updates
    }
}

/// Mocks behind an `Interview`, kept so tests can inspect them afterwards.
pub struct InterviewMocks {
    pub journal: Journal,
    pub api: Arc<MockSessionApi>,
    pub factory: MockTransportFactory,
    pub media: Arc<MockMediaSource>,
    pub clock_store: Arc<MemoryClockStore>,
}

impl InterviewMocks {
    pub fn new(api_session: duet_core::Session) -> Self {
        let journal = Journal::new();
        Self {
            api: Arc::new(MockSessionApi::new(api_session, journal.clone())),
            factory: MockTransportFactory::new(journal.clone()),
            media: Arc::new(MockMediaSource::new(journal.clone())),
            clock_store: Arc::new(MemoryClockStore::new()),
            journal,
        }
    }

    pub fn deps(&self) -> InterviewDeps {
        let clock_store: Arc<dyn ClockStore> = self.clock_store.clone();
        InterviewDeps {
            api: self.api.clone(),
            transport_factory: Arc::new(self.factory.clone()),
            media_source: self.media.clone(),
            clock_store,
        }
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        // Nothing listens here; tests that must not touch the relay would fail loudly.
        relay_url: "ws://127.0.0.1:9/ws".into(),
        join_timeout: Duration::from_secs(2),
        retry_delay: RETRY_DELAY,
        ..ClientConfig::default()
    }
}
