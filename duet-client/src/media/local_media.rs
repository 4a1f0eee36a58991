use crate::media::{MediaTrack, TrackKind};
use tracing::debug;

/// Audio/video toggles as shown in the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFlags {
    pub audio: bool,
    pub video: bool,
}

/// Scoped ownership of captured tracks. Every track is stopped when this is dropped.
#[derive(Debug, Default)]
pub struct LocalMedia {
    tracks: Vec<MediaTrack>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn flags(&self) -> MediaFlags {
        let live = |kind| {
            self.tracks
                .iter()
                .any(|t| t.kind() == kind && t.is_live() && t.is_enabled())
        };
        MediaFlags {
            audio: live(TrackKind::Audio),
            video: live(TrackKind::Video),
        }
    }

    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
        }
    }

    pub fn stop(&mut self) {
        for track in self.tracks.drain(..) {
            debug!("Stopping local track {}", track.id());
            track.stop();
        }
    }
}

impl Drop for LocalMedia {
    fn drop(&mut self) {
        self.stop();
    }
}
