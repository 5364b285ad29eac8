//! Metrics definitions for the media session orchestrator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ms_` prefix for media session
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, connect_error, track_error, publish_error, error
//! - `reason`: requested, connection_lost, shutdown
//! - `outcome`: started, stopped, capture_ended, failed
//! - `event`: bounded by `TransportEvent::label` (6 values)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return its handle.
///
/// Join duration buckets cover a connect over a slow network (up to 30s).
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ms_join_duration".to_string()),
            &[
                0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set join duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session lifecycle (Counters / Histograms)
// ============================================================================

/// Record a settled join attempt.
///
/// Metric: `ms_join_total`
/// Labels: `status`
pub fn record_join(status: &'static str) {
    counter!("ms_join_total", "status" => status).increment(1);
}

/// Record how long a join took to settle.
///
/// Metric: `ms_join_duration_seconds`
/// Labels: `status`
pub fn record_join_duration(status: &'static str, duration: Duration) {
    histogram!("ms_join_duration_seconds", "status" => status).record(duration.as_secs_f64());
}

/// Record a session teardown.
///
/// Metric: `ms_leave_total`
/// Labels: `reason`
pub fn record_leave(reason: &'static str) {
    counter!("ms_leave_total", "reason" => reason).increment(1);
}

/// Record a screen share transition.
///
/// Metric: `ms_screen_share_total`
/// Labels: `outcome`
pub fn record_screen_share(outcome: &'static str) {
    counter!("ms_screen_share_total", "outcome" => outcome).increment(1);
}

/// Record a processed transport event.
///
/// Metric: `ms_transport_events_total`
/// Labels: `event`
pub fn record_transport_event(event: &'static str) {
    counter!("ms_transport_events_total", "event" => event).increment(1);
}

// ============================================================================
// Gauges
// ============================================================================

/// Metric: `ms_remote_participants`
pub fn set_remote_participants(count: usize) {
    // usize to f64 is exact for realistic participant counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("ms_remote_participants").set(count as f64);
}

/// Metric: `ms_published_tracks`
pub fn set_published_tracks(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("ms_published_tracks").set(count as f64);
}
