use crate::utils::Journal;
use anyhow::{Result, bail};
use async_trait::async_trait;
use duet_client::{
    MediaTrack, PeerTransport, TransportEvent, TransportFactory, TransportSignal,
};
use duet_core::{IceCandidate, IceConfig};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// PeerTransport that logs `t<generation>:<call>` for every call.
pub struct MockTransport {
    generation: u64,
    journal: Journal,
    attached: Mutex<HashSet<String>>,
    reject_remote: bool,
}

impl MockTransport {
    fn log(&self, call: impl AsRef<str>) {
        self.journal
            .record(format!("t{}:{}", self.generation, call.as_ref()));
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&self) -> Result<String> {
        self.log("create_offer");
        Ok(format!("offer-{}", self.generation))
    }

    async fn create_answer(&self) -> Result<String> {
        self.log("create_answer");
        Ok(format!("answer-{}", self.generation))
    }

    async fn rollback_local_offer(&self) -> Result<()> {
        self.log("rollback");
        Ok(())
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        self.log(format!("remote_offer:{sdp}"));
        if self.reject_remote {
            bail!("malformed sdp");
        }
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        self.log(format!("remote_answer:{sdp}"));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.log(format!("ice:{}", candidate.candidate));
        Ok(())
    }

    async fn add_tracks(&self, tracks: &[MediaTrack]) -> Result<()> {
        let mut attached = self.attached.lock().unwrap();
        for track in tracks {
            if attached.insert(track.id().to_owned()) {
                self.log(format!("add:{}", track.id()));
            }
        }
        Ok(())
    }

    async fn remove_tracks(&self, tracks: &[MediaTrack]) -> Result<()> {
        let mut attached = self.attached.lock().unwrap();
        for track in tracks {
            if attached.remove(track.id()) {
                self.log(format!("remove:{}", track.id()));
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.log("close");
        Ok(())
    }
}

/// Hands out MockTransports and keeps their event senders so tests can play the
/// network side.
#[derive(Clone)]
pub struct MockTransportFactory {
    journal: Journal,
    senders: Arc<Mutex<Vec<(u64, mpsc::UnboundedSender<TransportSignal>)>>>,
    reject_remote: Arc<AtomicBool>,
}

impl MockTransportFactory {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            senders: Arc::new(Mutex::new(Vec::new())),
            reject_remote: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Transports created from now on reject every remote description.
    pub fn reject_remote_descriptions(&self, reject: bool) {
        self.reject_remote.store(reject, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    pub fn latest_generation(&self) -> Option<u64> {
        self.senders.lock().unwrap().last().map(|(g, _)| *g)
    }

    /// Raises `event` as if the transport of `generation` produced it.
    pub fn emit(&self, generation: u64, event: TransportEvent) {
        let senders = self.senders.lock().unwrap();
        let (_, tx) = senders
            .iter()
            .find(|(g, _)| *g == generation)
            .expect("no transport with that generation");
        tx.send(TransportSignal { generation, event }).unwrap();
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        _ice: &IceConfig,
        generation: u64,
        events: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<Arc<dyn PeerTransport>> {
        self.journal.record(format!("t{generation}:new"));
        self.senders.lock().unwrap().push((generation, events));
        Ok(Arc::new(MockTransport {
            generation,
            journal: self.journal.clone(),
            attached: Mutex::new(HashSet::new()),
            reject_remote: self.reject_remote.load(Ordering::SeqCst),
        }))
    }
}
