//! Observability for the media session orchestrator.
//!
//! # Privacy by Default
//!
//! Access tokens never reach logs or metric labels. Spans use
//! `#[instrument(skip_all)]` with explicitly allow-listed fields
//! (channel, participant ID). Metric labels are bounded enums.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `ms_join_total` | Counter | `status` | Join attempts by outcome |
//! | `ms_join_duration_seconds` | Histogram | `status` | Connect + acquire + publish time |
//! | `ms_leave_total` | Counter | `reason` | Teardowns by cause |
//! | `ms_screen_share_total` | Counter | `outcome` | Screen share transitions |
//! | `ms_transport_events_total` | Counter | `event` | Transport events processed |
//! | `ms_remote_participants` | Gauge | none | Current remote participant count |
//! | `ms_published_tracks` | Gauge | none | Local tracks currently published |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_join, record_join_duration, record_leave,
    record_screen_share, record_transport_event, set_published_tracks, set_remote_participants,
};
