//! Session error types.
//!
//! Every error carries enough detail for server-side logs, while
//! [`SessionError::notice_message`] gives a user-safe string that does not
//! leak transport internals.

use crate::transport::{MediaKind, TransportError};
use thiserror::Error;

/// Media session error type.
///
/// Recoverable errors leave the orchestrator in a well-defined prior state:
/// - `Connect`, `TrackAcquisition`: join failed, session is back to `Idle`
/// - `ScreenCapture`: screen share rolled back, camera republished
/// - `TransportDisconnected`: implicit leave, session is back to `Idle`
/// - `Subscribe`: remote track stays unsubscribed
#[derive(Debug, Error)]
pub enum SessionError {
    /// Joining the channel failed.
    #[error("Connect failed: {0}")]
    Connect(#[source] TransportError),

    /// Camera or microphone could not be acquired.
    #[error("Local track acquisition failed: {0}")]
    TrackAcquisition(#[source] TransportError),

    /// Screen capture was denied or could not be published.
    #[error("Screen capture failed: {0}")]
    ScreenCapture(#[source] TransportError),

    /// The transport dropped the connection unsolicited.
    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    /// Subscribing to a remote track failed.
    #[error("Subscribe to {participant_id}/{kind} failed: {source}")]
    Subscribe {
        participant_id: String,
        kind: MediaKind,
        source: TransportError,
    },

    /// Any other transport call failed.
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// The operation is not valid in the current phase.
    #[error("{operation} is not valid while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    /// A join is already in flight.
    #[error("A join is already in flight")]
    JoinInProgress,

    /// The local participant is not eligible to publish.
    #[error("Local participant is not eligible to publish")]
    NotPublisher,

    /// Actor mailbox or reply channel failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether the orchestrator remains usable after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Internal(_))
    }

    /// Returns a user-visible message (no internal details).
    #[must_use]
    pub fn notice_message(&self) -> String {
        match self {
            SessionError::Connect(_) => "Could not join the call, please try again".to_string(),
            SessionError::TrackAcquisition(_) => {
                "Camera or microphone is unavailable".to_string()
            }
            SessionError::ScreenCapture(TransportError::PermissionDenied(_)) => {
                "Screen sharing was cancelled".to_string()
            }
            SessionError::ScreenCapture(_) => "Screen sharing could not be started".to_string(),
            SessionError::TransportDisconnected(_) => {
                "Connection to the call was lost".to_string()
            }
            SessionError::Subscribe { .. } => {
                "Could not receive media from a participant".to_string()
            }
            SessionError::Transport(_) => "A media error occurred".to_string(),
            SessionError::InvalidState { .. } | SessionError::JoinInProgress => {
                "That action is not available right now".to_string()
            }
            SessionError::NotPublisher => {
                "You are not allowed to share media in this call".to_string()
            }
            SessionError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}
