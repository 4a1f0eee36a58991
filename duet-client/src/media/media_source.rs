use crate::media::{MediaTrack, TrackSource};
use async_trait::async_trait;
use duet_core::DuetError;

/// Which local devices to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Device access. Denial or a missing device is `DuetError::MediaAcquisition`.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn user_media(&self, constraints: MediaConstraints)
    -> Result<Vec<MediaTrack>, DuetError>;

    async fn display_media(&self) -> Result<Vec<MediaTrack>, DuetError>;
}

/// Produces placeholder tracks without touching hardware. Used by headless
/// clients that only need to negotiate.
#[derive(Debug, Default, Clone)]
pub struct SyntheticMediaSource;

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<Vec<MediaTrack>, DuetError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(
                format!("mic-{}", uuid::Uuid::new_v4()),
                TrackSource::Microphone,
            ));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(
                format!("cam-{}", uuid::Uuid::new_v4()),
                TrackSource::Camera,
            ));
        }
        if tracks.is_empty() {
            return Err(DuetError::MediaAcquisition(
                "no audio or video requested".into(),
            ));
        }
        Ok(tracks)
    }

    async fn display_media(&self) -> Result<Vec<MediaTrack>, DuetError> {
        Ok(vec![MediaTrack::new(
            format!("screen-{}", uuid::Uuid::new_v4()),
            TrackSource::Screen,
        )])
    }
}
