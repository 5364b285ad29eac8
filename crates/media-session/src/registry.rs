//! `RemoteParticipantRegistry` - projection of transport participant events.
//!
//! Events are applied strictly in the order received. On `TrackPublished`
//! the subscription is completed before the track becomes visible, so a
//! snapshot never holds a track reference that is not yet subscribed.
//!
//! Snapshots are copy-on-write: every change builds a new
//! [`RemoteParticipants`] value and replaces the published `Arc`. A snapshot
//! handed to a reader is never mutated afterwards.

use crate::errors::SessionError;
use crate::observability::metrics;
use crate::pinning::{resolve_pinned_media, PinnedMedia};
use crate::transport::{MediaKind, MediaTransport, RemoteTrack, TransportEvent};

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Which media kinds are currently subscribed for a participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscribedMedia {
    pub audio: bool,
    pub video: bool,
}

/// A remote participant and its subscribed tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteParticipant {
    pub participant_id: String,
    pub audio_track: Option<RemoteTrack>,
    pub video_track: Option<RemoteTrack>,
}

impl RemoteParticipant {
    fn new(participant_id: String) -> Self {
        Self {
            participant_id,
            audio_track: None,
            video_track: None,
        }
    }

    /// Subscription flags, derived from track presence.
    #[must_use]
    pub fn subscribed(&self) -> SubscribedMedia {
        SubscribedMedia {
            audio: self.audio_track.is_some(),
            video: self.video_track.is_some(),
        }
    }

    #[must_use]
    pub fn track(&self, kind: MediaKind) -> Option<&RemoteTrack> {
        match kind {
            MediaKind::Audio => self.audio_track.as_ref(),
            MediaKind::Video => self.video_track.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut Option<RemoteTrack> {
        match kind {
            MediaKind::Audio => &mut self.audio_track,
            MediaKind::Video => &mut self.video_track,
        }
    }
}

/// Immutable snapshot of the remote participant set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RemoteParticipants {
    participants: HashMap<String, RemoteParticipant>,
}

impl RemoteParticipants {
    #[must_use]
    pub fn get(&self, participant_id: &str) -> Option<&RemoteParticipant> {
        self.participants.get(participant_id)
    }

    #[must_use]
    pub fn contains(&self, participant_id: &str) -> bool {
        self.participants.contains_key(participant_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Iterate participants in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.participants.values()
    }

    /// Media to render for `pinned`, falling back to the local camera.
    #[must_use]
    pub fn pinned_tracks(&self, pinned: Option<&str>, local_camera: Option<&str>) -> PinnedMedia {
        resolve_pinned_media(pinned, self, local_camera)
    }
}

/// Authoritative remote participant set.
#[derive(Debug)]
pub struct RemoteParticipantRegistry {
    current: Arc<RemoteParticipants>,
    publisher: watch::Sender<Arc<RemoteParticipants>>,
}

impl Default for RemoteParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteParticipantRegistry {
    #[must_use]
    pub fn new() -> Self {
        let current = Arc::new(RemoteParticipants::default());
        let (publisher, _) = watch::channel(Arc::clone(&current));
        Self { current, publisher }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RemoteParticipants> {
        Arc::clone(&self.current)
    }

    /// Subscribe to snapshot replacements.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<RemoteParticipants>> {
        self.publisher.subscribe()
    }

    /// Apply one transport event.
    ///
    /// Returns whether the snapshot changed. Events that do not concern
    /// remote participants are ignored.
    pub async fn apply(
        &mut self,
        transport: &dyn MediaTransport,
        event: &TransportEvent,
    ) -> Result<bool, SessionError> {
        match event {
            TransportEvent::ParticipantJoined { participant_id } => {
                if self.current.contains(participant_id) {
                    return Ok(false);
                }
                let mut next = (*self.current).clone();
                next.participants.insert(
                    participant_id.clone(),
                    RemoteParticipant::new(participant_id.clone()),
                );
                info!(
                    target: "ms.registry",
                    participant_id = %participant_id,
                    "Remote participant joined"
                );
                self.commit(next);
                Ok(true)
            }

            TransportEvent::ParticipantLeft { participant_id } => {
                if !self.current.contains(participant_id) {
                    return Ok(false);
                }
                let mut next = (*self.current).clone();
                next.participants.remove(participant_id);
                info!(
                    target: "ms.registry",
                    participant_id = %participant_id,
                    "Remote participant left"
                );
                self.commit(next);
                Ok(true)
            }

            TransportEvent::TrackPublished {
                participant_id,
                kind,
            } => {
                let track = transport
                    .subscribe(participant_id, *kind)
                    .await
                    .map_err(|source| SessionError::Subscribe {
                        participant_id: participant_id.clone(),
                        kind: *kind,
                        source,
                    })?;

                let mut next = (*self.current).clone();
                let participant = next
                    .participants
                    .entry(participant_id.clone())
                    .or_insert_with(|| RemoteParticipant::new(participant_id.clone()));
                *participant.slot_mut(*kind) = Some(track);
                debug!(
                    target: "ms.registry",
                    participant_id = %participant_id,
                    kind = %kind,
                    "Remote track subscribed"
                );
                self.commit(next);
                Ok(true)
            }

            TransportEvent::TrackUnpublished {
                participant_id,
                kind,
            } => {
                let subscribed = self
                    .current
                    .get(participant_id)
                    .is_some_and(|p| p.track(*kind).is_some());
                if !subscribed {
                    return Ok(false);
                }
                let mut next = (*self.current).clone();
                if let Some(participant) = next.participants.get_mut(participant_id) {
                    *participant.slot_mut(*kind) = None;
                }
                debug!(
                    target: "ms.registry",
                    participant_id = %participant_id,
                    kind = %kind,
                    "Remote track unpublished"
                );
                self.commit(next);
                Ok(true)
            }

            TransportEvent::ScreenTrackEnded { .. } | TransportEvent::ConnectionLost { .. } => {
                Ok(false)
            }
        }
    }

    /// Drop every participant.
    pub fn clear(&mut self) {
        if self.current.is_empty() {
            return;
        }
        self.commit(RemoteParticipants::default());
    }

    fn commit(&mut self, next: RemoteParticipants) {
        self.current = Arc::new(next);
        metrics::set_remote_participants(self.current.len());
        self.publisher.send_replace(Arc::clone(&self.current));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;
    use crate::transport::{ConnectParams, TransportError};

    async fn connected_transport() -> LoopbackTransport {
        let transport = LoopbackTransport::new();
        transport
            .connect(&ConnectParams {
                app_id: "app".to_string(),
                channel: "room1".to_string(),
                token: None,
                participant_id: Some("u1".to_string()),
            })
            .await
            .unwrap();
        transport
    }

    fn joined(id: &str) -> TransportEvent {
        TransportEvent::ParticipantJoined {
            participant_id: id.to_string(),
        }
    }

    fn left(id: &str) -> TransportEvent {
        TransportEvent::ParticipantLeft {
            participant_id: id.to_string(),
        }
    }

    fn published(id: &str, kind: MediaKind) -> TransportEvent {
        TransportEvent::TrackPublished {
            participant_id: id.to_string(),
            kind,
        }
    }

    fn unpublished(id: &str, kind: MediaKind) -> TransportEvent {
        TransportEvent::TrackUnpublished {
            participant_id: id.to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_join_publish_leave_leaves_nothing_behind() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();

        for event in [joined("A"), published("A", MediaKind::Video), left("A")] {
            registry.apply(&transport, &event).await.unwrap();
        }

        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_track_visible_only_after_subscribe() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();
        registry.apply(&transport, &joined("A")).await.unwrap();

        transport.fail_next_subscribe(TransportError::Failed("timeout".to_string()));
        let result = registry
            .apply(&transport, &published("A", MediaKind::Audio))
            .await;

        assert!(matches!(result, Err(SessionError::Subscribe { .. })));
        let snapshot = registry.snapshot();
        let participant = snapshot.get("A").unwrap();
        assert_eq!(participant.subscribed(), SubscribedMedia::default());
        assert!(participant.audio_track.is_none());
    }

    #[tokio::test]
    async fn test_unpublish_clears_track_but_keeps_participant() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();

        for event in [
            joined("A"),
            published("A", MediaKind::Audio),
            published("A", MediaKind::Video),
            unpublished("A", MediaKind::Video),
        ] {
            registry.apply(&transport, &event).await.unwrap();
        }

        let snapshot = registry.snapshot();
        let participant = snapshot.get("A").unwrap();
        assert_eq!(
            participant.subscribed(),
            SubscribedMedia {
                audio: true,
                video: false
            }
        );
        assert_eq!(participant.audio_track.as_ref().unwrap().track_id, "A-audio");
    }

    #[tokio::test]
    async fn test_publish_for_unknown_participant_creates_entry() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();

        registry
            .apply(&transport, &published("B", MediaKind::Video))
            .await
            .unwrap();

        assert!(registry.snapshot().get("B").unwrap().subscribed().video);
    }

    #[tokio::test]
    async fn test_handed_out_snapshot_is_never_mutated() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();
        registry.apply(&transport, &joined("A")).await.unwrap();

        let before = registry.snapshot();
        registry
            .apply(&transport, &published("A", MediaKind::Video))
            .await
            .unwrap();
        registry.apply(&transport, &joined("B")).await.unwrap();

        assert_eq!(before.len(), 1);
        assert!(before.get("A").unwrap().video_track.is_none());
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_watchers_see_replacements() {
        let transport = connected_transport().await;
        let mut registry = RemoteParticipantRegistry::new();
        let mut rx = registry.watch();

        registry.apply(&transport, &joined("A")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().contains("A"));

        // Duplicate join does not churn the snapshot.
        let changed = registry.apply(&transport, &joined("A")).await.unwrap();
        assert!(!changed);
        assert!(!rx.has_changed().unwrap());

        registry.clear();
        assert!(rx.borrow_and_update().is_empty());
    }
}
