//! `ScreenShareController` - camera/screen publish swap.
//!
//! ```text
//! NotSharing -> Starting -> Sharing -> Stopping -> NotSharing
//!                  |
//!                  +-- failure: republish camera --> NotSharing
//! ```
//!
//! Exactly one of {camera video, screen} is published at a time. Rollback is
//! a property of the controller: any failure while starting restores the
//! camera publication the participant had before the attempt.
//!
//! A stopped screen track keeps its capture handle and is reused by the next
//! start. A track whose capture source ended externally, or that was released
//! on leave, is closed and a fresh one is requested next time.

use crate::errors::SessionError;
use crate::tracks::LocalTrackSet;
use crate::transport::{LocalTrackRef, MediaTransport, ScreenTrackConfig, TransportError};

use serde::Serialize;
use tracing::{error, info, warn};

/// Screen share state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenShareState {
    #[default]
    NotSharing,
    Starting,
    Sharing,
    Stopping,
}

impl ScreenShareState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScreenShareState::NotSharing => "not_sharing",
            ScreenShareState::Starting => "starting",
            ScreenShareState::Sharing => "sharing",
            ScreenShareState::Stopping => "stopping",
        }
    }
}

/// Owner of the optional screen-capture track.
#[derive(Debug)]
pub struct ScreenShareController {
    config: ScreenTrackConfig,
    state: ScreenShareState,
    track: Option<LocalTrackRef>,
    /// Whether the camera was published when sharing started.
    restore_camera: bool,
}

impl ScreenShareController {
    #[must_use]
    pub fn new(config: ScreenTrackConfig) -> Self {
        Self {
            config,
            state: ScreenShareState::NotSharing,
            track: None,
            restore_camera: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ScreenShareState {
        self.state
    }

    /// Whether `track_id` is the current screen track.
    #[must_use]
    pub fn owns_track(&self, track_id: &str) -> bool {
        self.track.as_ref().is_some_and(|t| t.id() == track_id)
    }

    /// Whether the screen track is currently published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.state == ScreenShareState::Sharing
    }

    /// Swap the camera for a screen track.
    ///
    /// On failure the camera publication is restored and the controller is
    /// back in `NotSharing`; the error is always `ScreenCapture`.
    pub async fn start(
        &mut self,
        transport: &dyn MediaTransport,
        tracks: &mut LocalTrackSet,
    ) -> Result<(), SessionError> {
        if self.state != ScreenShareState::NotSharing {
            return Err(SessionError::InvalidState {
                operation: "start_screen_share",
                phase: self.state.as_str(),
            });
        }

        self.state = ScreenShareState::Starting;
        self.restore_camera = tracks.camera_published();

        match self.try_start(transport, tracks).await {
            Ok(()) => {
                self.state = ScreenShareState::Sharing;
                info!(
                    target: "ms.screen_share",
                    track_id = ?self.track.as_ref().map(|t| t.id()),
                    "Screen share started"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    target: "ms.screen_share",
                    error = %e,
                    "Screen share failed to start, rolling back"
                );
                self.restore(transport, tracks).await;
                self.state = ScreenShareState::NotSharing;
                Err(SessionError::ScreenCapture(e))
            }
        }
    }

    async fn try_start(
        &mut self,
        transport: &dyn MediaTransport,
        tracks: &mut LocalTrackSet,
    ) -> Result<(), TransportError> {
        tracks
            .unpublish_video(transport)
            .await
            .map_err(into_transport_error)?;

        let track = match self.track.take() {
            Some(track) if !track.is_closed() => track,
            _ => transport.create_screen_track(&self.config).await?,
        };

        let published = transport.publish(std::slice::from_ref(&track)).await;
        // Keep a still-valid handle for the next attempt even if publish failed.
        self.track = Some(track);
        published
    }

    /// Swap the screen track back for the camera.
    ///
    /// If the screen cannot be unpublished the controller stays in `Sharing`
    /// with the track kept, and the camera is not republished.
    pub async fn stop(
        &mut self,
        transport: &dyn MediaTransport,
        tracks: &mut LocalTrackSet,
    ) -> Result<(), SessionError> {
        if self.state != ScreenShareState::Sharing {
            return Err(SessionError::InvalidState {
                operation: "stop_screen_share",
                phase: self.state.as_str(),
            });
        }

        self.state = ScreenShareState::Stopping;

        if let Some(track) = &self.track {
            if let Err(e) = transport.unpublish(std::slice::from_ref(track)).await {
                warn!(
                    target: "ms.screen_share",
                    track_id = %track.id(),
                    error = %e,
                    "Screen track unpublish failed, still sharing"
                );
                self.state = ScreenShareState::Sharing;
                return Err(SessionError::Transport(e));
            }
            track.stop();
        }

        let mut result = Ok(());
        if self.restore_camera {
            if let Err(e) = tracks.publish_video(transport).await {
                error!(
                    target: "ms.screen_share",
                    error = %e,
                    "Camera republish failed after screen share"
                );
                result = Err(e);
            }
        }

        self.state = ScreenShareState::NotSharing;
        info!(target: "ms.screen_share", "Screen share stopped");
        result
    }

    /// The capture source of `track_id` ended outside the orchestrator.
    ///
    /// Closes the track so it is never republished, then stops sharing.
    /// Returns `Ok(false)` if the track is not the one being shared. If the
    /// screen cannot be unpublished the closed track is kept so a later stop
    /// can retry.
    pub async fn handle_capture_ended(
        &mut self,
        transport: &dyn MediaTransport,
        tracks: &mut LocalTrackSet,
        track_id: &str,
    ) -> Result<bool, SessionError> {
        if !self.owns_track(track_id) {
            return Ok(false);
        }

        if self.state != ScreenShareState::Sharing {
            // Ended while idle: just drop the stale handle.
            self.close_track();
            return Ok(true);
        }

        info!(
            target: "ms.screen_share",
            track_id = %track_id,
            "Screen capture ended externally"
        );
        match self.stop(transport, tracks).await {
            Err(e) if self.state == ScreenShareState::Sharing => {
                if let Some(track) = &self.track {
                    track.stop();
                    track.close();
                }
                Err(e)
            }
            result => {
                self.close_track();
                result.map(|()| true)
            }
        }
    }

    /// Close the screen track and reset without any transport call.
    ///
    /// Used on leave and unsolicited disconnect, where the transport drops
    /// every publication itself.
    pub fn release(&mut self) {
        self.close_track();
        self.state = ScreenShareState::NotSharing;
        self.restore_camera = false;
    }

    fn close_track(&mut self) {
        if let Some(track) = self.track.take() {
            track.stop();
            track.close();
        }
    }

    async fn restore(&mut self, transport: &dyn MediaTransport, tracks: &mut LocalTrackSet) {
        if !self.restore_camera {
            return;
        }
        if let Err(e) = tracks.publish_video(transport).await {
            error!(
                target: "ms.screen_share",
                error = %e,
                "Camera republish failed during rollback"
            );
        }
    }
}

fn into_transport_error(err: SessionError) -> TransportError {
    match err {
        SessionError::Transport(e)
        | SessionError::Connect(e)
        | SessionError::TrackAcquisition(e)
        | SessionError::ScreenCapture(e) => e,
        other => TransportError::Failed(other.to_string()),
    }
}
