//! Actor layer.
//!
//! A single [`SessionActor`] owns the session. Everything else talks to it
//! through [`SessionHandle`], which is cheap to clone and safe to share
//! across tasks.

pub mod messages;
pub mod session;

pub use messages::{
    JoinRequest, JoinResult, SessionInfo, SessionMessage, SessionNotice, SessionOptions,
    SessionPhase, SessionStatus, TrackSelection, DEFAULT_MAILBOX_BUFFER,
};
pub use session::{SessionActor, SessionHandle};
