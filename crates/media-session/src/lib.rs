//! Real-Time Media Session Orchestrator
//!
//! The orchestration core of a call shell built around an external
//! real-time media engine. It coordinates:
//!
//! - Joining and leaving a channel
//! - Publishing, muting and pausing the local microphone/camera pair
//! - Swapping the camera for a screen capture and back
//! - Tracking remote participants and their subscribed media
//! - Following the externally announced pinned participant
//!
//! # Architecture
//!
//! ```text
//! SessionHandle (cloneable, any task)
//! └── SessionActor (single owner of all mutable state)
//!     ├── LocalTrackSet            microphone + camera
//!     ├── ScreenShareController    camera/screen swap
//!     ├── RemoteParticipantRegistry  copy-on-write snapshots
//!     └── PinningEventBridge       PinSignal -> pinned target
//!
//! MediaTransport (injected) <-> SessionActor <- TransportEvent stream
//! ```
//!
//! Observable state is exposed through `tokio::sync::watch` receivers on the
//! handle, so readers never block the actor.
//!
//! # Modules
//!
//! - [`actors`] - Session actor, handle and message types
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with user-safe notice messages
//! - [`transport`] - The `MediaTransport` boundary (plus the loopback engine)
//! - [`observability`] - Metrics

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pinning;
pub mod registry;
pub mod screen_share;
pub mod tracks;
pub mod transport;

pub use actors::{JoinRequest, SessionActor, SessionHandle, SessionOptions};
pub use errors::SessionError;
