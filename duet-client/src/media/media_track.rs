use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            TrackSource::Microphone => TrackKind::Audio,
            TrackSource::Camera | TrackSource::Screen => TrackKind::Video,
        }
    }
}

type StopHook = Box<dyn Fn() + Send + Sync>;

/// Handle to a captured device track. Stopping releases the device and is idempotent.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    source: TrackSource,
    live: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
    on_stop: Option<Arc<StopHook>>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, source: TrackSource) -> Self {
        Self {
            id: id.into(),
            source,
            live: Arc::new(AtomicBool::new(true)),
            enabled: Arc::new(AtomicBool::new(true)),
            on_stop: None,
        }
    }

    /// Runs `hook` once, when the track is first stopped.
    pub fn with_stop_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(Box::new(hook)));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Mute without releasing the device.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst)
            && let Some(hook) = &self.on_stop
        {
            hook();
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("live", &self.is_live())
            .finish()
    }
}
