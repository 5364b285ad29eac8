//! `MediaTransport` boundary - the external real-time media engine.
//!
//! The orchestrator never encodes, sends or signals media itself. Everything
//! that touches the network goes through the [`MediaTransport`] trait:
//!
//! - `connect` / `disconnect` for the call
//! - local track creation (microphone + camera pair, screen capture)
//! - `publish` / `unpublish` of local tracks
//! - `subscribe` to a remote participant's media
//! - an ordered event stream of participant lifecycle events
//!
//! Local track handles are engine objects exposed through [`LocalMediaTrack`].
//! Only the session actor holds the transport handle; every other component
//! receives it by reference for the duration of one call.

#[cfg(any(test, feature = "loopback"))]
pub mod loopback;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default encoder preset for screen capture.
pub const DEFAULT_SCREEN_ENCODER_PRESET: &str = "1080p_1";

/// Media kind of a remote track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Returns the media kind as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a local track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalTrackSource {
    Microphone,
    Camera,
    Screen,
}

/// A local track handle owned by the media engine.
///
/// Disabling a track keeps it allocated and published but stops it from
/// producing media. `stop` ends local playback/capture; `close` releases the
/// underlying device and makes the handle unusable.
pub trait LocalMediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn source(&self) -> LocalTrackSource;

    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn stop(&self);

    fn close(&self);

    /// A closed track must never be published again.
    fn is_closed(&self) -> bool;
}

/// Shared reference to a local track handle.
pub type LocalTrackRef = Arc<dyn LocalMediaTrack>;

/// A subscribed remote track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteTrack {
    /// Owning participant.
    pub participant_id: String,
    /// Audio or video.
    pub kind: MediaKind,
    /// Engine track identifier.
    pub track_id: String,
}

/// Events emitted by the transport, delivered in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ParticipantJoined {
        participant_id: String,
    },
    ParticipantLeft {
        participant_id: String,
    },
    TrackPublished {
        participant_id: String,
        kind: MediaKind,
    },
    TrackUnpublished {
        participant_id: String,
        kind: MediaKind,
    },
    /// The capture source of a local screen track was terminated externally
    /// (e.g. the operating system's "stop sharing" control).
    ScreenTrackEnded {
        track_id: String,
    },
    /// The engine lost the connection without a `disconnect` request.
    ConnectionLost {
        reason: String,
    },
}

impl TransportEvent {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            TransportEvent::ParticipantJoined { .. } => "participant_joined",
            TransportEvent::ParticipantLeft { .. } => "participant_left",
            TransportEvent::TrackPublished { .. } => "track_published",
            TransportEvent::TrackUnpublished { .. } => "track_unpublished",
            TransportEvent::ScreenTrackEnded { .. } => "screen_track_ended",
            TransportEvent::ConnectionLost { .. } => "connection_lost",
        }
    }
}

/// Parameters for `MediaTransport::connect`.
///
/// The access token is optional; unsecured channels accept a null token.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub app_id: String,
    pub channel: String,
    pub token: Option<SecretString>,
    /// Requested local participant ID. `None` lets the engine assign one.
    pub participant_id: Option<String>,
}

/// Encoder settings for the microphone/camera pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTracksConfig {
    pub microphone_encoder: Option<String>,
    pub camera_encoder: Option<String>,
}

/// Screen content optimization hint passed to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenOptimization {
    /// Favor sharpness (documents, code).
    #[default]
    Detail,
    /// Favor frame rate (video, animation).
    Motion,
    Balanced,
}

impl ScreenOptimization {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ScreenOptimization::Detail => "detail",
            ScreenOptimization::Motion => "motion",
            ScreenOptimization::Balanced => "balanced",
        }
    }

    /// Parse an optimization mode name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "detail" => Some(ScreenOptimization::Detail),
            "motion" => Some(ScreenOptimization::Motion),
            "balanced" => Some(ScreenOptimization::Balanced),
            _ => None,
        }
    }
}

/// Screen capture settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenTrackConfig {
    pub encoder_preset: String,
    pub optimization: ScreenOptimization,
    /// Capture system audio together with the screen.
    pub capture_audio: bool,
}

impl Default for ScreenTrackConfig {
    fn default() -> Self {
        Self {
            encoder_preset: DEFAULT_SCREEN_ENCODER_PRESET.to_string(),
            optimization: ScreenOptimization::Detail,
            capture_audio: false,
        }
    }
}

/// Errors reported by the media engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The media service refused the request (bad app ID, token, channel).
    #[error("rejected by media service: {0}")]
    Rejected(String),

    /// Camera, microphone or capture device is missing or busy.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The user or the platform denied access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation requires a connected transport.
    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Failed(String),
}

/// The external real-time media engine.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Join a channel. Returns the local participant ID in effect.
    async fn connect(&self, params: &ConnectParams) -> Result<String, TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Create the microphone and camera tracks as a pair.
    async fn create_local_audio_video_tracks(
        &self,
        config: &LocalTracksConfig,
    ) -> Result<(LocalTrackRef, LocalTrackRef), TransportError>;

    async fn create_screen_track(
        &self,
        config: &ScreenTrackConfig,
    ) -> Result<LocalTrackRef, TransportError>;

    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError>;

    async fn unpublish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError>;

    /// Request delivery of a remote participant's media.
    async fn subscribe(
        &self,
        participant_id: &str,
        kind: MediaKind,
    ) -> Result<RemoteTrack, TransportError>;

    /// Take the ordered event stream. Returns `None` once taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}
