//! In-process `MediaTransport` with no network behind it.
//!
//! `LoopbackTransport` keeps an ordered log of every call it receives, tracks
//! which local tracks are currently published, and lets the host inject
//! remote participant events. Individual operations can be scripted to fail
//! once, and `connect` can be given a simulated latency.

use super::{
    ConnectParams, LocalMediaTrack, LocalTrackRef, LocalTrackSource, LocalTracksConfig,
    MediaKind, MediaTransport, RemoteTrack, ScreenTrackConfig, TransportError, TransportEvent,
};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Participant ID assigned when `connect` is called without one.
const ASSIGNED_ID_PREFIX: &str = "loopback";

/// A call received by the loopback transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect {
        app_id: String,
        channel: String,
        participant_id: Option<String>,
    },
    Disconnect,
    CreateLocalTracks,
    CreateScreenTrack,
    Publish(Vec<String>),
    Unpublish(Vec<String>),
    Subscribe {
        participant_id: String,
        kind: MediaKind,
    },
}

/// Local track handle created by the loopback transport.
#[derive(Debug)]
pub struct LoopbackTrack {
    id: String,
    source: LocalTrackSource,
    enabled: AtomicBool,
    stopped: AtomicBool,
    closed: AtomicBool,
}

impl LoopbackTrack {
    fn new(id: String, source: LocalTrackSource) -> Self {
        Self {
            id,
            source,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether `stop` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl LocalMediaTrack for LoopbackTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> LocalTrackSource {
        self.source
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One-shot scripted failures.
#[derive(Debug, Default)]
struct ScriptedFailures {
    connect: Option<TransportError>,
    local_tracks: Option<TransportError>,
    screen_track: Option<TransportError>,
    publish: Option<TransportError>,
    unpublish: Option<TransportError>,
    subscribe: Option<TransportError>,
}

#[derive(Debug, Default)]
struct LoopbackState {
    calls: Vec<TransportCall>,
    connected: bool,
    published: BTreeSet<String>,
    next_track: u64,
    screen_tracks: Vec<Arc<LoopbackTrack>>,
    local_tracks: Vec<Arc<LoopbackTrack>>,
    failures: ScriptedFailures,
    connect_latency: Option<Duration>,
}

impl LoopbackState {
    fn next_track_id(&mut self, prefix: &str) -> String {
        self.next_track += 1;
        format!("{prefix}-{}", self.next_track)
    }
}

/// In-process media transport.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(LoopbackState::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay every `connect` by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.state().connect_latency = Some(latency);
    }

    /// Fail the next `connect`.
    pub fn fail_next_connect(&self, error: TransportError) {
        self.state().failures.connect = Some(error);
    }

    /// Fail the next microphone/camera acquisition.
    pub fn fail_next_local_tracks(&self, error: TransportError) {
        self.state().failures.local_tracks = Some(error);
    }

    /// Fail the next screen capture request.
    pub fn fail_next_screen_track(&self, error: TransportError) {
        self.state().failures.screen_track = Some(error);
    }

    /// Fail the next `publish`.
    pub fn fail_next_publish(&self, error: TransportError) {
        self.state().failures.publish = Some(error);
    }

    /// Fail the next `unpublish`. Nothing is removed from the published set.
    pub fn fail_next_unpublish(&self, error: TransportError) {
        self.state().failures.unpublish = Some(error);
    }

    /// Fail the next `subscribe`.
    pub fn fail_next_subscribe(&self, error: TransportError) {
        self.state().failures.subscribe = Some(error);
    }

    /// Deliver a transport event to the session.
    pub fn inject(&self, event: TransportEvent) {
        // The receiver only goes away with the session; nothing to deliver to.
        let _ = self.events_tx.send(event);
    }

    /// Simulate the platform's "stop sharing" control on the latest screen track.
    ///
    /// Returns the ID of the ended track.
    pub fn end_screen_capture(&self) -> Option<String> {
        let track = self.state().screen_tracks.last().cloned()?;
        track.stop();
        let track_id = track.id().to_string();
        self.inject(TransportEvent::ScreenTrackEnded {
            track_id: track_id.clone(),
        });
        Some(track_id)
    }

    /// Simulate an unsolicited connection drop.
    pub fn drop_connection(&self, reason: &str) {
        {
            let mut state = self.state();
            state.connected = false;
            state.published.clear();
        }
        self.inject(TransportEvent::ConnectionLost {
            reason: reason.to_string(),
        });
    }

    /// All calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    /// Number of `connect` calls received.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Connect { .. }))
            .count()
    }

    /// IDs of currently published local tracks.
    #[must_use]
    pub fn published_track_ids(&self) -> Vec<String> {
        self.state().published.iter().cloned().collect()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Every microphone/camera track handed out, in creation order.
    #[must_use]
    pub fn local_tracks(&self) -> Vec<Arc<LoopbackTrack>> {
        self.state().local_tracks.clone()
    }

    /// Every screen track handed out, in creation order.
    #[must_use]
    pub fn screen_tracks(&self) -> Vec<Arc<LoopbackTrack>> {
        self.state().screen_tracks.clone()
    }
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    async fn connect(&self, params: &ConnectParams) -> Result<String, TransportError> {
        let latency = {
            let mut state = self.state();
            state.calls.push(TransportCall::Connect {
                app_id: params.app_id.clone(),
                channel: params.channel.clone(),
                participant_id: params.participant_id.clone(),
            });
            state.connect_latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if let Some(error) = state.failures.connect.take() {
            return Err(error);
        }
        if state.connected {
            return Err(TransportError::Failed("already connected".to_string()));
        }
        state.connected = true;

        let participant_id = match &params.participant_id {
            Some(id) => id.clone(),
            None => state.next_track_id(ASSIGNED_ID_PREFIX),
        };
        debug!(
            target: "ms.transport.loopback",
            channel = %params.channel,
            participant_id = %participant_id,
            "Loopback connected"
        );
        Ok(participant_id)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Disconnect);
        state.connected = false;
        state.published.clear();
        Ok(())
    }

    async fn create_local_audio_video_tracks(
        &self,
        _config: &LocalTracksConfig,
    ) -> Result<(LocalTrackRef, LocalTrackRef), TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::CreateLocalTracks);
        if let Some(error) = state.failures.local_tracks.take() {
            return Err(error);
        }

        let microphone = Arc::new(LoopbackTrack::new(
            state.next_track_id("mic"),
            LocalTrackSource::Microphone,
        ));
        let camera = Arc::new(LoopbackTrack::new(
            state.next_track_id("cam"),
            LocalTrackSource::Camera,
        ));
        state.local_tracks.push(Arc::clone(&microphone));
        state.local_tracks.push(Arc::clone(&camera));

        Ok((microphone, camera))
    }

    async fn create_screen_track(
        &self,
        _config: &ScreenTrackConfig,
    ) -> Result<LocalTrackRef, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::CreateScreenTrack);
        if let Some(error) = state.failures.screen_track.take() {
            return Err(error);
        }

        let screen = Arc::new(LoopbackTrack::new(
            state.next_track_id("screen"),
            LocalTrackSource::Screen,
        ));
        state.screen_tracks.push(Arc::clone(&screen));
        Ok(screen)
    }

    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError> {
        let mut state = self.state();
        state
            .calls
            .push(TransportCall::Publish(track_ids(tracks)));
        if let Some(error) = state.failures.publish.take() {
            return Err(error);
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(closed) = tracks.iter().find(|t| t.is_closed()) {
            return Err(TransportError::Failed(format!(
                "track {} is closed",
                closed.id()
            )));
        }
        state.published.extend(track_ids(tracks));
        Ok(())
    }

    async fn unpublish(&self, tracks: &[LocalTrackRef]) -> Result<(), TransportError> {
        let mut state = self.state();
        state
            .calls
            .push(TransportCall::Unpublish(track_ids(tracks)));
        if let Some(error) = state.failures.unpublish.take() {
            return Err(error);
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        for track in tracks {
            state.published.remove(track.id());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        participant_id: &str,
        kind: MediaKind,
    ) -> Result<RemoteTrack, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Subscribe {
            participant_id: participant_id.to_string(),
            kind,
        });
        if let Some(error) = state.failures.subscribe.take() {
            return Err(error);
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(RemoteTrack {
            participant_id: participant_id.to_string(),
            kind,
            track_id: format!("{participant_id}-{kind}"),
        })
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn track_ids(tracks: &[LocalTrackRef]) -> Vec<String> {
    tracks.iter().map(|t| t.id().to_string()).collect()
}
