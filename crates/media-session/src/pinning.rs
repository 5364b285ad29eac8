//! `PinningEventBridge` - external pin notifications to `PinnedTarget`.
//!
//! The pin channel is injected as a [`PinSignal`]. The bridge is a pure
//! sink: it stores the latest pinned participant and performs no transport
//! calls. Detaching (explicitly or on drop) unsubscribes from the signal so
//! no update lands after teardown.
//!
//! [`resolve_pinned_media`] maps the pinned target onto the media a
//! presentation layer would render for it.

use crate::registry::RemoteParticipants;
use crate::transport::RemoteTrack;

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info};

/// Callback invoked with the newly pinned participant ID.
pub type PinHandler = Box<dyn Fn(String) + Send + Sync>;

/// Token returned by [`PinSignal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinSubscriptionId(pub u64);

/// External `pin-updated` notification channel.
pub trait PinSignal: Send + Sync {
    fn subscribe(&self, handler: PinHandler) -> PinSubscriptionId;

    fn unsubscribe(&self, id: PinSubscriptionId);
}

/// Adapts a [`PinSignal`] into a pinned-target observable.
pub struct PinningEventBridge {
    signal: Arc<dyn PinSignal>,
    subscription: Option<PinSubscriptionId>,
    pinned: Arc<watch::Sender<Option<String>>>,
}

impl PinningEventBridge {
    /// Subscribe to `signal` and start tracking the pinned target.
    #[must_use]
    pub fn attach(signal: Arc<dyn PinSignal>) -> Self {
        let (sender, _) = watch::channel(None);
        let pinned = Arc::new(sender);

        let sink: Weak<watch::Sender<Option<String>>> = Arc::downgrade(&pinned);
        let subscription = signal.subscribe(Box::new(move |participant_id: String| {
            if let Some(sink) = sink.upgrade() {
                debug!(
                    target: "ms.pin",
                    participant_id = %participant_id,
                    "Pinned target updated"
                );
                sink.send_replace(Some(participant_id));
            }
        }));

        Self {
            signal,
            subscription: Some(subscription),
            pinned,
        }
    }

    /// Latest pinned participant, if any.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.pinned.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.pinned.subscribe()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Unsubscribe from the signal. Idempotent.
    pub fn detach(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.signal.unsubscribe(id);
            info!(target: "ms.pin", "Pin bridge detached");
        }
    }
}

impl Drop for PinningEventBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for PinningEventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningEventBridge")
            .field("subscription", &self.subscription)
            .field("pinned", &*self.pinned.borrow())
            .finish_non_exhaustive()
    }
}

/// Video the presentation layer should render for the pinned target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PinnedVideo {
    Remote(RemoteTrack),
    /// The local camera, shown when the pinned participant is not a
    /// subscribed remote (including when the local participant is pinned).
    LocalCamera { track_id: String },
}

/// Media resolved for the pinned target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinnedMedia {
    pub participant_id: Option<String>,
    pub audio: Option<RemoteTrack>,
    pub video: Option<PinnedVideo>,
}

/// Resolve what to render for `pinned`.
///
/// A pinned remote participant contributes its subscribed audio and video.
/// Otherwise only the local camera is offered, without audio.
#[must_use]
pub fn resolve_pinned_media(
    pinned: Option<&str>,
    remote: &RemoteParticipants,
    local_camera: Option<&str>,
) -> PinnedMedia {
    if let Some(participant) = pinned.and_then(|id| remote.get(id)) {
        return PinnedMedia {
            participant_id: Some(participant.participant_id.clone()),
            audio: participant.audio_track.clone(),
            video: participant.video_track.clone().map(PinnedVideo::Remote),
        };
    }

    PinnedMedia {
        participant_id: pinned.map(str::to_string),
        audio: None,
        video: local_camera.map(|id| PinnedVideo::LocalCamera {
            track_id: id.to_string(),
        }),
    }
}

#[derive(Default)]
struct LocalPinSignalInner {
    next_id: u64,
    handlers: BTreeMap<PinSubscriptionId, Arc<dyn Fn(String) + Send + Sync>>,
}

/// In-process [`PinSignal`].
///
/// Whatever relays the external pin channel calls [`LocalPinSignal::emit`].
#[derive(Clone, Default)]
pub struct LocalPinSignal {
    inner: Arc<Mutex<LocalPinSignalInner>>,
}

impl LocalPinSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, LocalPinSignalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `pin-updated(participant_id)` to every subscriber.
    pub fn emit(&self, participant_id: &str) {
        let handlers: Vec<_> = self.inner().handlers.values().cloned().collect();
        for handler in handlers {
            handler(participant_id.to_string());
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner().handlers.len()
    }
}

impl PinSignal for LocalPinSignal {
    fn subscribe(&self, handler: PinHandler) -> PinSubscriptionId {
        let mut inner = self.inner();
        inner.next_id += 1;
        let id = PinSubscriptionId(inner.next_id);
        inner.handlers.insert(id, Arc::from(handler));
        id
    }

    fn unsubscribe(&self, id: PinSubscriptionId) {
        self.inner().handlers.remove(&id);
    }
}

impl std::fmt::Debug for LocalPinSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPinSignal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
