//! `LocalTrackSet` - the local microphone/camera pair.
//!
//! The pair is created lazily, at most once per join cycle. Enable/disable
//! and publish/unpublish are independent: a disabled track stays published
//! but produces no media, and the camera can be unpublished on its own while
//! the microphone keeps publishing (screen-share takeover).
//!
//! `release` always stops and closes whatever was acquired, regardless of
//! which operations ran before it.

use crate::errors::SessionError;
use crate::transport::{LocalTrackRef, LocalTracksConfig, MediaTransport};

use serde::Serialize;
use tracing::{debug, info};

/// Observable state of one local track.
///
/// Presence is expressed by the surrounding `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalTrackState {
    pub enabled: bool,
    pub published: bool,
}

/// Snapshot of the local track pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalTracksSnapshot {
    pub audio: Option<LocalTrackState>,
    pub video: Option<LocalTrackState>,
}

impl LocalTracksSnapshot {
    /// Number of published local tracks.
    #[must_use]
    pub fn published_count(&self) -> usize {
        [self.audio, self.video]
            .iter()
            .flatten()
            .filter(|t| t.published)
            .count()
    }
}

#[derive(Debug)]
struct TrackSlot {
    track: LocalTrackRef,
    published: bool,
}

impl TrackSlot {
    fn state(&self) -> LocalTrackState {
        LocalTrackState {
            enabled: self.track.is_enabled(),
            published: self.published,
        }
    }
}

/// Owner of the local microphone and camera tracks.
#[derive(Debug, Default)]
pub struct LocalTrackSet {
    audio: Option<TrackSlot>,
    video: Option<TrackSlot>,
}

impl LocalTrackSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pair has been acquired in this cycle.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        self.audio.is_some() || self.video.is_some()
    }

    /// Create the microphone/camera pair if not already present.
    pub async fn acquire(
        &mut self,
        transport: &dyn MediaTransport,
        config: &LocalTracksConfig,
    ) -> Result<(), SessionError> {
        if self.is_acquired() {
            return Ok(());
        }

        let (audio, video) = transport
            .create_local_audio_video_tracks(config)
            .await
            .map_err(SessionError::TrackAcquisition)?;

        debug!(
            target: "ms.tracks",
            audio_track = %audio.id(),
            audio_source = ?audio.source(),
            video_track = %video.id(),
            video_source = ?video.source(),
            "Local tracks acquired"
        );

        self.audio = Some(TrackSlot {
            track: audio,
            published: false,
        });
        self.video = Some(TrackSlot {
            track: video,
            published: false,
        });
        Ok(())
    }

    /// Publish every acquired track that is not yet published, in one call.
    pub async fn publish_all(
        &mut self,
        transport: &dyn MediaTransport,
    ) -> Result<(), SessionError> {
        let pending: Vec<LocalTrackRef> = [&self.audio, &self.video]
            .into_iter()
            .flatten()
            .filter(|slot| !slot.published)
            .map(|slot| slot.track.clone())
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        transport
            .publish(&pending)
            .await
            .map_err(SessionError::Transport)?;

        for slot in [&mut self.audio, &mut self.video].into_iter().flatten() {
            slot.published = true;
        }
        Ok(())
    }

    /// Publish the camera track alone. No-op if absent or already published.
    pub async fn publish_video(
        &mut self,
        transport: &dyn MediaTransport,
    ) -> Result<(), SessionError> {
        let Some(slot) = self.video.as_mut() else {
            return Ok(());
        };
        if slot.published {
            return Ok(());
        }

        transport
            .publish(std::slice::from_ref(&slot.track))
            .await
            .map_err(SessionError::Transport)?;
        slot.published = true;
        Ok(())
    }

    /// Unpublish the camera track alone. The track stays allocated.
    pub async fn unpublish_video(
        &mut self,
        transport: &dyn MediaTransport,
    ) -> Result<(), SessionError> {
        let Some(slot) = self.video.as_mut() else {
            return Ok(());
        };
        if !slot.published {
            return Ok(());
        }

        transport
            .unpublish(std::slice::from_ref(&slot.track))
            .await
            .map_err(SessionError::Transport)?;
        slot.published = false;
        Ok(())
    }

    /// Enable or disable the microphone. Returns `false` if it is absent.
    pub fn set_audio_enabled(&self, enabled: bool) -> bool {
        match &self.audio {
            Some(slot) => {
                slot.track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Enable or disable the camera. Returns `false` if it is absent.
    pub fn set_video_enabled(&self, enabled: bool) -> bool {
        match &self.video {
            Some(slot) => {
                slot.track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn camera_published(&self) -> bool {
        self.video.as_ref().is_some_and(|slot| slot.published)
    }

    /// ID of the camera track, if acquired.
    #[must_use]
    pub fn camera_track_id(&self) -> Option<&str> {
        self.video.as_ref().map(|slot| slot.track.id())
    }

    /// Stop and close both tracks and forget them.
    ///
    /// Safe to call in any state; a following `acquire` creates a fresh pair.
    pub fn release(&mut self) {
        for slot in [self.audio.take(), self.video.take()].into_iter().flatten() {
            slot.track.stop();
            slot.track.close();
            info!(
                target: "ms.tracks",
                track_id = %slot.track.id(),
                was_published = slot.published,
                "Local track released"
            );
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> LocalTracksSnapshot {
        LocalTracksSnapshot {
            audio: self.audio.as_ref().map(TrackSlot::state),
            video: self.video.as_ref().map(TrackSlot::state),
        }
    }
}
