use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use duet_core::SessionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the start of a session clock survives a client restart.
pub trait ClockStore: Send + Sync {
    fn load(&self, session_id: &SessionId) -> Result<Option<DateTime<Utc>>>;

    fn save(&self, session_id: &SessionId, started_at: DateTime<Utc>) -> Result<()>;

    fn clear(&self, session_id: &SessionId) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryClockStore {
    starts: DashMap<SessionId, DateTime<Utc>>,
}

impl MemoryClockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClockStore for MemoryClockStore {
    fn load(&self, session_id: &SessionId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.starts.get(session_id).map(|s| *s.value()))
    }

    fn save(&self, session_id: &SessionId, started_at: DateTime<Utc>) -> Result<()> {
        self.starts.insert(session_id.clone(), started_at);
        Ok(())
    }

    fn clear(&self, session_id: &SessionId) -> Result<()> {
        self.starts.remove(session_id);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClockRecord {
    session_id: SessionId,
    started_at: DateTime<Utc>,
}

/// One JSON file per session under `dir`.
#[derive(Debug, Clone)]
pub struct FileClockStore {
    dir: PathBuf,
}

impl FileClockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &SessionId) -> PathBuf {
        let name: String = session_id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("session-clock-{name}.json"))
    }
}

impl ClockStore for FileClockStore {
    fn load(&self, session_id: &SessionId) -> Result<Option<DateTime<Utc>>> {
        let path = self.path_for(session_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let record: ClockRecord = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt clock file {}", path.display()))?;
        if &record.session_id != session_id {
            warn!("Clock file {} belongs to another session", path.display());
            return Ok(None);
        }
        Ok(Some(record.started_at))
    }

    fn save(&self, session_id: &SessionId, started_at: DateTime<Utc>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let record = ClockRecord {
            session_id: session_id.clone(),
            started_at,
        };
        let path = self.path_for(session_id);
        std::fs::write(&path, serde_json::to_vec(&record)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn clear(&self, session_id: &SessionId) -> Result<()> {
        let path = self.path_for(session_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// Elapsed-time clock of one interview. Starts at the first successful join and
/// resumes from the persisted start after a restart.
pub struct SessionClock {
    session_id: SessionId,
    store: Arc<dyn ClockStore>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl SessionClock {
    pub fn new(session_id: SessionId, store: Arc<dyn ClockStore>) -> Self {
        Self {
            session_id,
            store,
            started_at: None,
            stopped_at: None,
        }
    }

    /// Starts the clock, or resumes it from the stored start. Returns the start instant.
    pub fn start(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(started) = self.started_at {
            self.stopped_at = None;
            return started;
        }

        let started = match self.store.load(&self.session_id) {
            Ok(Some(started)) => {
                debug!("Resuming clock for session {} from {}", self.session_id, started);
                started
            }
            Ok(None) => {
                if let Err(e) = self.store.save(&self.session_id, now) {
                    warn!("Failed to persist session clock: {:#}", e);
                }
                now
            }
            Err(e) => {
                warn!("Failed to load session clock: {:#}", e);
                now
            }
        };
        self.started_at = Some(started);
        self.stopped_at = None;
        started
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Zero before the clock starts; never negative. Frozen once stopped.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let until = self.stopped_at.map_or(now, |stopped| now.min(stopped));
        self.started_at
            .and_then(|started| (until - started).to_std().ok())
            .unwrap_or_default()
    }

    /// Stops ticking at `now`. The persisted start stays until `clear`.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if self.is_running() {
            self.stopped_at = Some(now);
        }
    }

    pub fn clear(&mut self) {
        self.stopped_at = None;
        self.started_at = None;
        if let Err(e) = self.store.clear(&self.session_id) {
            warn!("Failed to clear session clock: {:#}", e);
        }
    }
}
