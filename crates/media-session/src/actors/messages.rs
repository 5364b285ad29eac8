//! Message and snapshot types for the session actor.
//!
//! Requests travel over a bounded `tokio::sync::mpsc` mailbox; replies come
//! back over `tokio::sync::oneshot`. Observable state is published through
//! `tokio::sync::watch` and never requires a round trip.

use crate::errors::SessionError;
use crate::pinning::PinnedMedia;
use crate::tracks::LocalTracksSnapshot;
use crate::transport::{ConnectParams, LocalTracksConfig, MediaKind, ScreenTrackConfig};

use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::oneshot;

/// Default mailbox capacity.
pub const DEFAULT_MAILBOX_BUFFER: usize = 64;

/// Behavior fixed when the actor is constructed.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Whether the local participant publishes media. Decided by the host
    /// before construction.
    pub publish: bool,
    pub local_tracks: LocalTracksConfig,
    pub screen_track: ScreenTrackConfig,
    pub mailbox_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            publish: true,
            local_tracks: LocalTracksConfig::default(),
            screen_track: ScreenTrackConfig::default(),
            mailbox_buffer: DEFAULT_MAILBOX_BUFFER,
        }
    }
}

/// Join intent.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub app_id: String,
    pub channel: String,
    pub token: Option<SecretString>,
    /// `None` lets the transport assign the local participant ID.
    pub participant_id: Option<String>,
}

impl JoinRequest {
    #[must_use]
    pub fn new(app_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            channel: channel.into(),
            token: None,
            participant_id: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    #[must_use]
    pub fn with_participant_id(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub(crate) fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            app_id: self.app_id.clone(),
            channel: self.channel.clone(),
            token: self.token.clone(),
            participant_id: self.participant_id.clone(),
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinResult {
    /// Local participant ID in effect (requested or transport-assigned).
    pub local_participant_id: String,
    /// Whether local audio/video were published.
    pub published: bool,
}

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Joining,
    Joined,
    Leaving,
    /// Transient: a join failed and the session is resetting to `Idle`.
    JoinFailed,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Joining => "joining",
            SessionPhase::Joined => "joined",
            SessionPhase::Leaving => "leaving",
            SessionPhase::JoinFailed => "join_failed",
        }
    }
}

/// The live session. The access token is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub app_id: String,
    pub channel: String,
    /// Known once connect returns.
    pub local_participant_id: Option<String>,
}

/// Observable session status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub joined: bool,
    pub session: Option<SessionInfo>,
}

/// Which local tracks an enable/disable request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelection {
    Audio,
    Video,
    Both,
}

/// User-visible, non-fatal notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    /// Screen share could not start; the camera was restored.
    ScreenShareFailed { message: String },
    /// The capture source ended the screen share.
    ScreenShareEnded,
    /// The transport dropped the session.
    Disconnected { message: String },
    /// A remote track could not be subscribed.
    SubscribeFailed {
        participant_id: String,
        kind: MediaKind,
        message: String,
    },
}

/// Messages sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    Join {
        request: JoinRequest,
        respond_to: oneshot::Sender<Result<JoinResult, SessionError>>,
    },

    Leave {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Toggle `enabled` on local tracks. Publication is untouched.
    SetTracksEnabled {
        selection: TrackSelection,
        enabled: bool,
        respond_to: oneshot::Sender<LocalTracksSnapshot>,
    },

    StartScreenShare {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    StopScreenShare {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Resolve the media to render for the pinned target.
    GetPinnedMedia {
        respond_to: oneshot::Sender<PinnedMedia>,
    },
}

impl SessionMessage {
    /// Bounded name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            SessionMessage::Join { .. } => "join",
            SessionMessage::Leave { .. } => "leave",
            SessionMessage::SetTracksEnabled { .. } => "set_tracks_enabled",
            SessionMessage::StartScreenShare { .. } => "start_screen_share",
            SessionMessage::StopScreenShare { .. } => "stop_screen_share",
            SessionMessage::GetPinnedMedia { .. } => "get_pinned_media",
        }
    }
}
