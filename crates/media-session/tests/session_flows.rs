//! End-to-end session flows against the loopback transport.
//!
//! Covers the join/leave lifecycle, screen share swap and rollback, remote
//! participant projection, unsolicited disconnects and pin handling, all
//! through the public `SessionHandle` API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use media_session::actors::{
    JoinRequest, SessionActor, SessionHandle, SessionNotice, SessionOptions, SessionPhase,
};
use media_session::errors::SessionError;
use media_session::pinning::{LocalPinSignal, PinnedVideo};
use media_session::screen_share::ScreenShareState;
use media_session::transport::loopback::{LoopbackTransport, TransportCall};
use media_session::transport::{
    LocalMediaTrack, MediaKind, MediaTransport, TransportError, TransportEvent,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    transport: Arc<LoopbackTransport>,
    pin_signal: LocalPinSignal,
    session: SessionHandle,
    task: JoinHandle<()>,
}

fn start(options: SessionOptions) -> Harness {
    let transport = Arc::new(LoopbackTransport::new());
    let pin_signal = LocalPinSignal::new();
    let (session, task) = SessionActor::spawn(
        Arc::clone(&transport) as Arc<dyn MediaTransport>,
        Arc::new(pin_signal.clone()),
        options,
        CancellationToken::new(),
    );
    Harness {
        transport,
        pin_signal,
        session,
        task,
    }
}

async fn joined() -> Harness {
    let harness = start(SessionOptions::default());
    harness
        .session
        .join(
            JoinRequest::new("X", "room1")
                .with_token("T")
                .with_participant_id("u1"),
        )
        .await
        .unwrap();
    harness
}

fn joined_event(id: &str) -> TransportEvent {
    TransportEvent::ParticipantJoined {
        participant_id: id.to_string(),
    }
}

fn left_event(id: &str) -> TransportEvent {
    TransportEvent::ParticipantLeft {
        participant_id: id.to_string(),
    }
}

fn published_event(id: &str, kind: MediaKind) -> TransportEvent {
    TransportEvent::TrackPublished {
        participant_id: id.to_string(),
        kind,
    }
}

async fn wait_for_phase(session: &SessionHandle, phase: SessionPhase) {
    let mut status = session.watch_status();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.phase == phase))
        .await
        .expect("timed out waiting for phase")
        .unwrap();
}

async fn wait_for_screen(session: &SessionHandle, state: ScreenShareState) {
    let mut screen = session.watch_screen_share();
    tokio::time::timeout(WAIT, screen.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for screen share state")
        .unwrap();
}

fn camera_id(transport: &LoopbackTransport) -> String {
    transport
        .local_tracks()
        .iter()
        .find(|t| t.id().starts_with("cam-"))
        .unwrap()
        .id()
        .to_string()
}

// ============================================================================
// Join / leave
// ============================================================================

#[tokio::test]
async fn test_join_connects_once_and_publishes_pair() {
    let h = joined().await;

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls.first(),
        Some(&TransportCall::Connect {
            app_id: "X".to_string(),
            channel: "room1".to_string(),
            participant_id: Some("u1".to_string()),
        })
    );
    assert_eq!(calls.get(1), Some(&TransportCall::CreateLocalTracks));
    assert!(matches!(calls.get(2), Some(TransportCall::Publish(ids)) if ids.len() == 2));

    let status = h.session.status();
    assert!(status.joined);
    assert_eq!(
        status.session.unwrap().local_participant_id.as_deref(),
        Some("u1")
    );
}

#[tokio::test]
async fn test_join_then_leave_leaves_nothing_behind() {
    let h = joined().await;
    h.transport.inject(joined_event("A"));
    let mut remote = h.session.watch_remote_participants();
    tokio::time::timeout(WAIT, remote.wait_for(|r| r.contains("A")))
        .await
        .unwrap()
        .unwrap();

    h.session.leave().await.unwrap();

    assert_eq!(h.session.status().phase, SessionPhase::Idle);
    assert!(h.session.remote_participants().is_empty());
    assert_eq!(h.session.local_tracks().published_count(), 0);
    assert!(h.transport.published_track_ids().is_empty());
    assert!(h.transport.local_tracks().iter().all(|t| t.is_closed()));

    // Idempotent.
    h.session.leave().await.unwrap();
    let disconnects = h
        .transport
        .calls()
        .iter()
        .filter(|c| matches!(c, TransportCall::Disconnect))
        .count();
    assert_eq!(disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reentrant_join_is_rejected() {
    let h = start(SessionOptions::default());
    h.transport.set_connect_latency(Duration::from_millis(300));

    let session = h.session.clone();
    let first = tokio::spawn(async move { session.join(JoinRequest::new("X", "room1")).await });
    wait_for_phase(&h.session, SessionPhase::Joining).await;

    let second = h.session.join(JoinRequest::new("X", "room1")).await;

    assert!(matches!(second, Err(SessionError::JoinInProgress)));
    first.await.unwrap().unwrap();
    assert_eq!(h.transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_join_waits_for_join_to_settle() {
    let h = start(SessionOptions::default());
    h.transport.set_connect_latency(Duration::from_millis(300));

    let session = h.session.clone();
    let join = tokio::spawn(async move { session.join(JoinRequest::new("X", "room1")).await });
    wait_for_phase(&h.session, SessionPhase::Joining).await;

    h.session.leave().await.unwrap();
    join.await.unwrap().unwrap();

    let calls = h.transport.calls();
    assert!(matches!(calls.first(), Some(TransportCall::Connect { .. })));
    assert_eq!(calls.get(1), Some(&TransportCall::CreateLocalTracks));
    assert!(matches!(calls.get(2), Some(TransportCall::Publish(_))));
    assert_eq!(calls.get(3), Some(&TransportCall::Disconnect));
    assert_eq!(calls.len(), 4);
    assert_eq!(h.session.status().phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_failed_join_is_noop() {
    let h = start(SessionOptions::default());
    h.transport.set_connect_latency(Duration::from_millis(300));
    h.transport
        .fail_next_connect(TransportError::Rejected("token expired".to_string()));

    let session = h.session.clone();
    let join = tokio::spawn(async move { session.join(JoinRequest::new("X", "room1")).await });
    wait_for_phase(&h.session, SessionPhase::Joining).await;

    h.session.leave().await.unwrap();
    let result = join.await.unwrap();

    assert!(matches!(result, Err(SessionError::Connect(_))));
    assert!(!h.transport.calls().contains(&TransportCall::Disconnect));
    assert_eq!(h.transport.calls().len(), 1);
    assert_eq!(h.session.status().phase, SessionPhase::Idle);
    assert!(h.session.status().session.is_none());
}

#[tokio::test]
async fn test_track_acquisition_failure_disconnects_cleanly() {
    let h = start(SessionOptions::default());
    h.transport
        .fail_next_local_tracks(TransportError::DeviceUnavailable("camera busy".to_string()));

    let result = h.session.join(JoinRequest::new("X", "room1")).await;

    assert!(matches!(result, Err(SessionError::TrackAcquisition(_))));
    assert_eq!(
        h.transport.calls().last(),
        Some(&TransportCall::Disconnect)
    );
    assert!(!h.transport.is_connected());
    assert!(h.transport.published_track_ids().is_empty());
    assert_eq!(h.session.status().phase, SessionPhase::Idle);
}

#[tokio::test]
async fn test_publish_failure_releases_acquired_tracks() {
    let h = start(SessionOptions::default());
    h.transport
        .fail_next_publish(TransportError::Failed("publish timeout".to_string()));

    let result = h.session.join(JoinRequest::new("X", "room1")).await;

    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert!(h.transport.local_tracks().iter().all(|t| t.is_closed()));
    assert!(!h.transport.is_connected());
}

// ============================================================================
// Local tracks
// ============================================================================

#[tokio::test]
async fn test_mute_and_pause_never_touch_publication() {
    let h = joined().await;

    let snapshot = h.session.mute_local_audio().await.unwrap();
    assert!(!snapshot.audio.unwrap().enabled);
    assert!(snapshot.audio.unwrap().published);

    let snapshot = h.session.pause_local_video().await.unwrap();
    assert!(!snapshot.video.unwrap().enabled);
    assert!(snapshot.video.unwrap().published);

    let snapshot = h.session.resume_local_tracks().await.unwrap();
    assert!(snapshot.audio.unwrap().enabled);
    assert!(snapshot.video.unwrap().enabled);

    let snapshot = h.session.pause_local_tracks().await.unwrap();
    assert!(!snapshot.audio.unwrap().enabled);
    assert!(!snapshot.video.unwrap().enabled);
    assert_eq!(snapshot.published_count(), 2);

    let snapshot = h.session.unmute_local_audio().await.unwrap();
    assert!(snapshot.audio.unwrap().enabled);

    assert_eq!(h.transport.published_track_ids().len(), 2);
    assert!(!h
        .transport
        .calls()
        .iter()
        .any(|c| matches!(c, TransportCall::Unpublish(_))));
}

#[tokio::test]
async fn test_mute_when_idle_is_noop() {
    let h = start(SessionOptions::default());

    let snapshot = h.session.mute_local_audio().await.unwrap();

    assert!(snapshot.audio.is_none());
    assert!(h.transport.calls().is_empty());
}

// ============================================================================
// Screen share
// ============================================================================

#[tokio::test]
async fn test_screen_share_round_trip_restores_published_set() {
    let h = joined().await;
    let before = h.transport.published_track_ids();
    let camera = camera_id(&h.transport);

    h.session.start_screen_share().await.unwrap();
    assert_eq!(h.session.screen_share_state(), ScreenShareState::Sharing);
    let sharing = h.transport.published_track_ids();
    assert!(!sharing.contains(&camera));
    assert!(sharing.iter().any(|id| id.starts_with("screen-")));
    assert!(!h.session.local_tracks().video.unwrap().published);

    h.session.stop_screen_share().await.unwrap();
    assert_eq!(h.session.screen_share_state(), ScreenShareState::NotSharing);
    assert_eq!(h.transport.published_track_ids(), before);
}

#[tokio::test]
async fn test_failed_screen_unpublish_keeps_camera_unpublished() {
    let h = joined().await;
    let camera = camera_id(&h.transport);
    h.session.start_screen_share().await.unwrap();
    let sharing = h.transport.published_track_ids();

    h.transport
        .fail_next_unpublish(TransportError::Failed("engine busy".to_string()));
    let result = h.session.stop_screen_share().await;

    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert_eq!(h.session.screen_share_state(), ScreenShareState::Sharing);
    assert_eq!(h.transport.published_track_ids(), sharing);
    assert!(!h.transport.published_track_ids().contains(&camera));
    assert!(!h.session.local_tracks().video.unwrap().published);

    h.session.stop_screen_share().await.unwrap();
    assert_eq!(h.session.screen_share_state(), ScreenShareState::NotSharing);
    assert!(h.transport.published_track_ids().contains(&camera));
}

#[tokio::test]
async fn test_stopped_screen_track_is_reused() {
    let h = joined().await;

    h.session.start_screen_share().await.unwrap();
    h.session.stop_screen_share().await.unwrap();
    h.session.start_screen_share().await.unwrap();

    let creates = h
        .transport
        .calls()
        .iter()
        .filter(|c| matches!(c, TransportCall::CreateScreenTrack))
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn test_screen_capture_denied_rolls_back_to_camera() {
    let h = joined().await;
    let before = h.transport.published_track_ids();
    let mut notices = h.session.notices();
    h.transport
        .fail_next_screen_track(TransportError::PermissionDenied("user cancelled".to_string()));

    let result = h.session.start_screen_share().await;

    assert!(matches!(result, Err(SessionError::ScreenCapture(_))));
    assert_eq!(h.session.screen_share_state(), ScreenShareState::NotSharing);
    assert_eq!(h.transport.published_track_ids(), before);
    assert!(h.session.local_tracks().video.unwrap().published);

    let notice = tokio::time::timeout(WAIT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        notice,
        SessionNotice::ScreenShareFailed {
            message: "Screen sharing was cancelled".to_string()
        }
    );

    // Still usable afterwards.
    h.session.start_screen_share().await.unwrap();
}

#[tokio::test]
async fn test_external_capture_end_stops_sharing() {
    let h = joined().await;
    let camera = camera_id(&h.transport);
    let mut notices = h.session.notices();
    h.session.start_screen_share().await.unwrap();

    let ended = h.transport.end_screen_capture().unwrap();
    wait_for_screen(&h.session, ScreenShareState::NotSharing).await;

    assert!(h.transport.published_track_ids().contains(&camera));
    assert!(!h.transport.published_track_ids().contains(&ended));
    let notice = tokio::time::timeout(WAIT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice, SessionNotice::ScreenShareEnded);

    // The ended track is closed and never republished.
    h.session.start_screen_share().await.unwrap();
    let screens = h.transport.screen_tracks();
    assert_eq!(screens.len(), 2);
    assert!(screens.first().unwrap().is_closed());
    assert!(!h.transport.published_track_ids().contains(&ended));
}

#[tokio::test]
async fn test_screen_share_requires_joined_session() {
    let h = start(SessionOptions::default());

    let result = h.session.start_screen_share().await;
    assert!(matches!(
        result,
        Err(SessionError::InvalidState {
            operation: "start_screen_share",
            ..
        })
    ));

    let result = h.session.stop_screen_share().await;
    assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    assert!(h.transport.calls().is_empty());
}

// ============================================================================
// Remote participants
// ============================================================================

#[tokio::test]
async fn test_join_publish_leave_sequence_ends_empty() {
    let h = joined().await;
    let mut remote = h.session.watch_remote_participants();

    for event in [
        joined_event("A"),
        published_event("A", MediaKind::Video),
        left_event("A"),
        joined_event("B"),
    ] {
        h.transport.inject(event);
    }
    tokio::time::timeout(WAIT, remote.wait_for(|r| r.contains("B")))
        .await
        .unwrap()
        .unwrap();

    let snapshot = h.session.remote_participants();
    assert!(!snapshot.contains("A"));
    assert_eq!(snapshot.len(), 1);
    assert!(h.transport.calls().contains(&TransportCall::Subscribe {
        participant_id: "A".to_string(),
        kind: MediaKind::Video,
    }));
}

#[tokio::test]
async fn test_subscribe_failure_is_reported_and_later_events_apply() {
    let h = joined().await;
    let mut notices = h.session.notices();
    let mut remote = h.session.watch_remote_participants();
    h.transport
        .fail_next_subscribe(TransportError::Failed("no route".to_string()));

    for event in [
        joined_event("A"),
        published_event("A", MediaKind::Audio),
        published_event("A", MediaKind::Video),
    ] {
        h.transport.inject(event);
    }
    tokio::time::timeout(
        WAIT,
        remote.wait_for(|r| r.get("A").is_some_and(|p| p.subscribed().video)),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(!h.session.remote_participants().get("A").unwrap().subscribed().audio);
    let notice = tokio::time::timeout(WAIT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        notice,
        SessionNotice::SubscribeFailed { ref participant_id, kind: MediaKind::Audio, .. }
            if participant_id == "A"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_events_from_previous_session_never_reach_next_one() {
    let h = start(SessionOptions::default());
    h.transport.set_connect_latency(Duration::from_millis(100));

    for round in 0..5 {
        h.session
            .join(JoinRequest::new("X", "room1"))
            .await
            .unwrap();
        h.session.leave().await.unwrap();
        h.transport.inject(joined_event("late-room1-peer"));

        h.session
            .join(JoinRequest::new("X", "room2"))
            .await
            .unwrap();
        assert!(
            h.session.remote_participants().is_empty(),
            "round {round}: registry not empty after join"
        );

        let peer = format!("room2-peer-{round}");
        h.transport.inject(joined_event(&peer));
        let mut remote = h.session.watch_remote_participants();
        tokio::time::timeout(WAIT, remote.wait_for(|r| r.contains(&peer)))
            .await
            .unwrap()
            .unwrap();

        let snapshot = h.session.remote_participants();
        assert!(!snapshot.contains("late-room1-peer"), "round {round}");
        assert_eq!(snapshot.len(), 1);

        h.session.leave().await.unwrap();
    }
}

#[tokio::test]
async fn test_events_while_idle_are_discarded() {
    let h = start(SessionOptions::default());
    h.transport.inject(joined_event("A"));

    h.session
        .join(JoinRequest::new("X", "room1"))
        .await
        .unwrap();
    h.transport.inject(joined_event("B"));
    let mut remote = h.session.watch_remote_participants();
    tokio::time::timeout(WAIT, remote.wait_for(|r| r.contains("B")))
        .await
        .unwrap()
        .unwrap();

    assert!(!h.session.remote_participants().contains("A"));
}

// ============================================================================
// Unsolicited disconnect
// ============================================================================

#[tokio::test]
async fn test_connection_lost_resets_without_disconnect_call() {
    let h = joined().await;
    let mut notices = h.session.notices();
    let mut remote = h.session.watch_remote_participants();
    h.transport.inject(joined_event("A"));
    tokio::time::timeout(WAIT, remote.wait_for(|r| r.contains("A")))
        .await
        .unwrap()
        .unwrap();
    h.session.start_screen_share().await.unwrap();

    h.transport.drop_connection("network unreachable");
    wait_for_phase(&h.session, SessionPhase::Idle).await;

    assert!(h.session.remote_participants().is_empty());
    assert_eq!(h.session.screen_share_state(), ScreenShareState::NotSharing);
    assert!(h.transport.local_tracks().iter().all(|t| t.is_closed()));
    assert!(h.transport.screen_tracks().iter().all(|t| t.is_closed()));
    assert!(!h
        .transport
        .calls()
        .contains(&TransportCall::Disconnect));

    let notice = tokio::time::timeout(WAIT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(notice, SessionNotice::Disconnected { .. }));

    // A fresh join acquires a fresh pair.
    h.session.join(JoinRequest::new("X", "room1")).await.unwrap();
    assert_eq!(h.transport.local_tracks().len(), 4);
}

// ============================================================================
// Pinning and shutdown
// ============================================================================

#[tokio::test]
async fn test_pin_updates_resolve_pinned_media() {
    let h = joined().await;
    let mut remote = h.session.watch_remote_participants();
    for event in [
        joined_event("u2"),
        published_event("u2", MediaKind::Audio),
        published_event("u2", MediaKind::Video),
    ] {
        h.transport.inject(event);
    }
    tokio::time::timeout(
        WAIT,
        remote.wait_for(|r| r.get("u2").is_some_and(|p| p.subscribed().video)),
    )
    .await
    .unwrap()
    .unwrap();

    let media = h.session.pinned_media().await.unwrap();
    assert!(matches!(media.video, Some(PinnedVideo::LocalCamera { .. })));

    h.pin_signal.emit("u2");
    assert_eq!(h.session.pinned_target().as_deref(), Some("u2"));

    let media = h.session.pinned_media().await.unwrap();
    assert_eq!(media.audio.unwrap().track_id, "u2-audio");
    assert!(matches!(media.video, Some(PinnedVideo::Remote(ref t)) if t.track_id == "u2-video"));
}

#[tokio::test]
async fn test_shutdown_detaches_pin_bridge_and_disconnects() {
    let h = joined().await;
    h.pin_signal.emit("u2");

    h.session.shutdown().await;
    h.task.await.unwrap();

    assert_eq!(h.pin_signal.subscriber_count(), 0);
    h.pin_signal.emit("u3");
    assert_eq!(h.session.pinned_target().as_deref(), Some("u2"));

    assert!(!h.transport.is_connected());
    assert_eq!(h.transport.calls().last(), Some(&TransportCall::Disconnect));
    assert!(h.session.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_join_settles_then_tears_down() {
    let h = start(SessionOptions::default());
    h.transport.set_connect_latency(Duration::from_millis(300));

    let session = h.session.clone();
    let join = tokio::spawn(async move { session.join(JoinRequest::new("X", "room1")).await });
    wait_for_phase(&h.session, SessionPhase::Joining).await;

    h.session.shutdown().await;

    join.await.unwrap().unwrap();
    h.task.await.unwrap();
    assert_eq!(h.transport.calls().last(), Some(&TransportCall::Disconnect));
    assert!(!h.transport.is_connected());
}
