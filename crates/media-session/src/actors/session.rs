//! `SessionActor` - one per orchestrator instance.
//!
//! The actor owns every piece of mutable session state: the transport
//! handle, the local track pair, the screen share controller, the remote
//! participant registry and the pin bridge. Callers talk to it through a
//! cloneable [`SessionHandle`].
//!
//! # Event loop
//!
//! The `select!` loop is the only place state changes. Transport calls
//! suspend the loop but never interleave with another mutation, with one
//! exception: a join runs as a pending future so the mailbox keeps draining
//! while connect is in flight. Messages that arrive meanwhile are deferred
//! and replayed in arrival order once the join settles (a second join is
//! rejected instead). Transport events are not polled while a join is
//! pending; they stay queued in the transport's ordered channel. Events
//! still queued when a session ends or a new join starts belong to the old
//! session and are dropped unread.
//!
//! # Teardown
//!
//! Leave, an unsolicited `ConnectionLost`, and shutdown all go through the
//! same teardown: close the screen track, stop and close local tracks,
//! clear the registry, then disconnect (skipped when the transport already
//! dropped the session).

use crate::actors::messages::{
    JoinRequest, JoinResult, SessionInfo, SessionMessage, SessionNotice, SessionOptions,
    SessionPhase, SessionStatus, TrackSelection,
};
use crate::errors::SessionError;
use crate::observability::metrics;
use crate::pinning::{PinSignal, PinnedMedia, PinningEventBridge};
use crate::registry::{RemoteParticipantRegistry, RemoteParticipants};
use crate::screen_share::{ScreenShareController, ScreenShareState};
use crate::tracks::{LocalTrackSet, LocalTracksSnapshot};
use crate::transport::{ConnectParams, LocalTracksConfig, MediaTransport, TransportEvent};

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Capacity of the notice broadcast channel.
const NOTICE_CHANNEL_BUFFER: usize = 32;

/// Handle to the session actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    status: watch::Receiver<SessionStatus>,
    local_tracks: watch::Receiver<LocalTracksSnapshot>,
    remote_participants: watch::Receiver<Arc<RemoteParticipants>>,
    pinned_target: watch::Receiver<Option<String>>,
    screen_share: watch::Receiver<ScreenShareState>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }

    /// Join a channel.
    ///
    /// Valid only from `Idle`. Resolves once connect (and, for publishers,
    /// local track publication) has settled.
    pub async fn join(&self, request: JoinRequest) -> Result<JoinResult, SessionError> {
        self.request(|respond_to| SessionMessage::Join {
            request,
            respond_to,
        })
        .await?
    }

    /// Leave the channel. Idempotent when `Idle`; waits for an in-flight
    /// join to settle first.
    pub async fn leave(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Leave { respond_to })
            .await?
    }

    async fn set_enabled(
        &self,
        selection: TrackSelection,
        enabled: bool,
    ) -> Result<LocalTracksSnapshot, SessionError> {
        self.request(|respond_to| SessionMessage::SetTracksEnabled {
            selection,
            enabled,
            respond_to,
        })
        .await
    }

    pub async fn mute_local_audio(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Audio, false).await
    }

    pub async fn unmute_local_audio(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Audio, true).await
    }

    pub async fn pause_local_video(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Video, false).await
    }

    pub async fn resume_local_video(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Video, true).await
    }

    /// Disable both local tracks.
    pub async fn pause_local_tracks(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Both, false).await
    }

    pub async fn resume_local_tracks(&self) -> Result<LocalTracksSnapshot, SessionError> {
        self.set_enabled(TrackSelection::Both, true).await
    }

    /// Swap the published camera for a screen capture.
    ///
    /// On failure the camera is republished and a
    /// [`SessionNotice::ScreenShareFailed`] is broadcast.
    pub async fn start_screen_share(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::StartScreenShare { respond_to })
            .await?
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::StopScreenShare { respond_to })
            .await?
    }

    /// Media to render for the current pinned target.
    pub async fn pinned_media(&self) -> Result<PinnedMedia, SessionError> {
        self.request(|respond_to| SessionMessage::GetPinnedMedia { respond_to })
            .await
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.status.borrow().joined
    }

    #[must_use]
    pub fn local_tracks(&self) -> LocalTracksSnapshot {
        *self.local_tracks.borrow()
    }

    #[must_use]
    pub fn remote_participants(&self) -> Arc<RemoteParticipants> {
        Arc::clone(&self.remote_participants.borrow())
    }

    #[must_use]
    pub fn pinned_target(&self) -> Option<String> {
        self.pinned_target.borrow().clone()
    }

    #[must_use]
    pub fn screen_share_state(&self) -> ScreenShareState {
        *self.screen_share.borrow()
    }

    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn watch_local_tracks(&self) -> watch::Receiver<LocalTracksSnapshot> {
        self.local_tracks.clone()
    }

    #[must_use]
    pub fn watch_remote_participants(&self) -> watch::Receiver<Arc<RemoteParticipants>> {
        self.remote_participants.clone()
    }

    #[must_use]
    pub fn watch_pinned_target(&self) -> watch::Receiver<Option<String>> {
        self.pinned_target.clone()
    }

    #[must_use]
    pub fn watch_screen_share(&self) -> watch::Receiver<ScreenShareState> {
        self.screen_share.clone()
    }

    /// Subscribe to user-visible notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Cancel the actor without waiting for it to exit.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel the actor and wait until it has torn down and exited.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let mut status = self.status.clone();
        while status.changed().await.is_ok() {}
    }
}

/// Result of the join future: the track set travels with it and comes back.
struct JoinOutcome {
    tracks: LocalTrackSet,
    result: Result<String, SessionError>,
}

struct PendingJoin {
    started: Instant,
    respond_to: oneshot::Sender<Result<JoinResult, SessionError>>,
    future: BoxFuture<'static, JoinOutcome>,
}

/// The session actor.
pub struct SessionActor {
    transport: Arc<dyn MediaTransport>,
    options: SessionOptions,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    phase: SessionPhase,
    session: Option<SessionInfo>,
    tracks: LocalTrackSet,
    screen: ScreenShareController,
    registry: RemoteParticipantRegistry,
    pin_bridge: PinningEventBridge,
    pending_join: Option<PendingJoin>,
    deferred: VecDeque<SessionMessage>,
    status_tx: watch::Sender<SessionStatus>,
    tracks_tx: watch::Sender<LocalTracksSnapshot>,
    screen_tx: watch::Sender<ScreenShareState>,
    notices_tx: broadcast::Sender<SessionNotice>,
}

impl SessionActor {
    /// Spawn the actor.
    ///
    /// Takes the transport's event stream and subscribes to `pin_signal`
    /// immediately.
    pub fn spawn(
        transport: Arc<dyn MediaTransport>,
        pin_signal: Arc<dyn PinSignal>,
        options: SessionOptions,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(options.mailbox_buffer.max(1));

        let events = transport.take_events();
        if events.is_none() {
            warn!(
                target: "ms.actor.session",
                "Transport event stream already taken; remote participants will not be tracked"
            );
        }

        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (tracks_tx, tracks_rx) = watch::channel(LocalTracksSnapshot::default());
        let (screen_tx, screen_rx) = watch::channel(ScreenShareState::NotSharing);
        let (notices_tx, _) = broadcast::channel(NOTICE_CHANNEL_BUFFER);

        let registry = RemoteParticipantRegistry::new();
        let pin_bridge = PinningEventBridge::attach(pin_signal);

        let handle = SessionHandle {
            sender,
            cancel_token: cancel_token.clone(),
            status: status_rx,
            local_tracks: tracks_rx,
            remote_participants: registry.watch(),
            pinned_target: pin_bridge.watch(),
            screen_share: screen_rx,
            notices: notices_tx.clone(),
        };

        let actor = Self {
            transport,
            screen: ScreenShareController::new(options.screen_track.clone()),
            options,
            receiver,
            cancel_token,
            events,
            phase: SessionPhase::Idle,
            session: None,
            tracks: LocalTrackSet::new(),
            registry,
            pin_bridge,
            pending_join: None,
            deferred: VecDeque::new(),
            status_tx,
            tracks_tx,
            screen_tx,
            notices_tx,
        };

        let task_handle = tokio::spawn(actor.run());

        (handle, task_handle)
    }

    async fn run(mut self) {
        info!(
            target: "ms.actor.session",
            publish = self.options.publish,
            "SessionActor started"
        );

        loop {
            let join_pending = self.pending_join.is_some();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "ms.actor.session",
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                outcome = settle(&mut self.pending_join) => {
                    self.finish_join(outcome);
                    self.drain_deferred().await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "ms.actor.session",
                                "SessionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }

                event = next_event(&mut self.events), if !join_pending => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            warn!(
                                target: "ms.actor.session",
                                "Transport event stream closed"
                            );
                            self.events = None;
                        }
                    }
                }
            }
        }

        self.graceful_shutdown().await;

        info!(target: "ms.actor.session", "SessionActor stopped");
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Join {
                request,
                respond_to,
            } => self.handle_join(request, respond_to),

            SessionMessage::GetPinnedMedia { respond_to } => {
                let media = self.registry.snapshot().pinned_tracks(
                    self.pin_bridge.current().as_deref(),
                    self.tracks.camera_track_id(),
                );
                let _ = respond_to.send(media);
            }

            other if self.pending_join.is_some() => {
                debug!(
                    target: "ms.actor.session",
                    message = other.name(),
                    "Deferring message until join settles"
                );
                self.deferred.push_back(other);
            }

            SessionMessage::Leave { respond_to } => {
                let result = self.handle_leave().await;
                let _ = respond_to.send(result);
            }

            SessionMessage::SetTracksEnabled {
                selection,
                enabled,
                respond_to,
            } => {
                if matches!(selection, TrackSelection::Audio | TrackSelection::Both) {
                    self.tracks.set_audio_enabled(enabled);
                }
                if matches!(selection, TrackSelection::Video | TrackSelection::Both) {
                    self.tracks.set_video_enabled(enabled);
                }
                debug!(
                    target: "ms.actor.session",
                    ?selection,
                    enabled,
                    "Local track enabled state changed"
                );
                self.publish_local_state();
                let _ = respond_to.send(self.tracks.snapshot());
            }

            SessionMessage::StartScreenShare { respond_to } => {
                let result = self.handle_start_screen_share().await;
                let _ = respond_to.send(result);
            }

            SessionMessage::StopScreenShare { respond_to } => {
                let result = self.handle_stop_screen_share().await;
                let _ = respond_to.send(result);
            }
        }
    }

    #[instrument(skip_all, name = "ms.session.join", fields(channel = %request.channel))]
    fn handle_join(
        &mut self,
        request: JoinRequest,
        respond_to: oneshot::Sender<Result<JoinResult, SessionError>>,
    ) {
        if self.pending_join.is_some() {
            debug!(target: "ms.actor.session", "Join rejected, join already in flight");
            let _ = respond_to.send(Err(SessionError::JoinInProgress));
            return;
        }
        if self.phase != SessionPhase::Idle {
            let _ = respond_to.send(Err(SessionError::InvalidState {
                operation: "join",
                phase: self.phase.as_str(),
            }));
            return;
        }

        info!(
            target: "ms.actor.session",
            channel = %request.channel,
            requested_participant_id = ?request.participant_id,
            publish = self.options.publish,
            "Joining channel"
        );

        self.session = Some(SessionInfo {
            app_id: request.app_id.clone(),
            channel: request.channel.clone(),
            local_participant_id: None,
        });
        self.set_phase(SessionPhase::Joining);
        self.discard_stale_events();

        let future = run_join(
            Arc::clone(&self.transport),
            request.connect_params(),
            std::mem::take(&mut self.tracks),
            self.options.publish,
            self.options.local_tracks.clone(),
        )
        .boxed();

        self.pending_join = Some(PendingJoin {
            started: Instant::now(),
            respond_to,
            future,
        });
    }

    fn finish_join(&mut self, outcome: JoinOutcome) {
        let Some(pending) = self.pending_join.take() else {
            return;
        };
        self.tracks = outcome.tracks;

        let reply = match outcome.result {
            Ok(local_participant_id) => {
                if let Some(session) = self.session.as_mut() {
                    session.local_participant_id = Some(local_participant_id.clone());
                }
                self.set_phase(SessionPhase::Joined);
                self.publish_local_state();
                metrics::record_join("success");
                metrics::record_join_duration("success", pending.started.elapsed());

                info!(
                    target: "ms.actor.session",
                    local_participant_id = %local_participant_id,
                    published = self.options.publish,
                    "Joined channel"
                );
                Ok(JoinResult {
                    local_participant_id,
                    published: self.options.publish,
                })
            }
            Err(e) => {
                let status = join_failure_status(&e);
                warn!(
                    target: "ms.actor.session",
                    error = %e,
                    "Join failed"
                );
                self.set_phase(SessionPhase::JoinFailed);
                self.session = None;
                self.set_phase(SessionPhase::Idle);
                self.publish_local_state();
                metrics::record_join(status);
                metrics::record_join_duration(status, pending.started.elapsed());
                Err(e)
            }
        };

        let _ = pending.respond_to.send(reply);
    }

    async fn drain_deferred(&mut self) {
        while let Some(message) = self.deferred.pop_front() {
            self.handle_message(message).await;
        }
    }

    #[instrument(skip_all, name = "ms.session.leave")]
    async fn handle_leave(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => {
                debug!(target: "ms.actor.session", "Leave while idle, nothing to do");
                Ok(())
            }
            _ => self.teardown("requested", true).await,
        }
    }

    async fn handle_start_screen_share(&mut self) -> Result<(), SessionError> {
        if !self.options.publish {
            return Err(SessionError::NotPublisher);
        }
        if self.phase != SessionPhase::Joined {
            return Err(SessionError::InvalidState {
                operation: "start_screen_share",
                phase: self.phase.as_str(),
            });
        }

        self.screen_tx.send_replace(ScreenShareState::Starting);
        let result = self
            .screen
            .start(self.transport.as_ref(), &mut self.tracks)
            .await;
        self.publish_local_state();

        match result {
            Ok(()) => {
                metrics::record_screen_share("started");
                Ok(())
            }
            Err(e) => {
                if matches!(e, SessionError::ScreenCapture(_)) {
                    metrics::record_screen_share("failed");
                    self.notify(SessionNotice::ScreenShareFailed {
                        message: e.notice_message(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn handle_stop_screen_share(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Joined {
            return Err(SessionError::InvalidState {
                operation: "stop_screen_share",
                phase: self.phase.as_str(),
            });
        }

        if self.screen.state() == ScreenShareState::Sharing {
            self.screen_tx.send_replace(ScreenShareState::Stopping);
        }
        let result = self
            .screen
            .stop(self.transport.as_ref(), &mut self.tracks)
            .await;
        self.publish_local_state();

        if result.is_ok() {
            metrics::record_screen_share("stopped");
        }
        result
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        metrics::record_transport_event(event.label());

        if self.phase != SessionPhase::Joined {
            debug!(
                target: "ms.actor.session",
                event = event.label(),
                phase = self.phase.as_str(),
                "Discarding transport event outside a session"
            );
            return;
        }

        match event {
            TransportEvent::ScreenTrackEnded { track_id } => {
                match self
                    .screen
                    .handle_capture_ended(self.transport.as_ref(), &mut self.tracks, &track_id)
                    .await
                {
                    Ok(true) => {
                        metrics::record_screen_share("capture_ended");
                        self.notify(SessionNotice::ScreenShareEnded);
                    }
                    Ok(false) => {
                        debug!(
                            target: "ms.actor.session",
                            track_id = %track_id,
                            "Ignoring end of a track that is not being shared"
                        );
                    }
                    Err(e) => {
                        warn!(
                            target: "ms.actor.session",
                            track_id = %track_id,
                            error = %e,
                            "Failed to stop screen share after capture ended"
                        );
                    }
                }
                self.publish_local_state();
            }

            TransportEvent::ConnectionLost { reason } => {
                warn!(
                    target: "ms.actor.session",
                    reason = %reason,
                    "Transport dropped the session"
                );
                let message = SessionError::TransportDisconnected(reason).notice_message();
                if let Err(e) = self.teardown("connection_lost", false).await {
                    warn!(target: "ms.actor.session", error = %e, "Teardown failed");
                }
                self.notify(SessionNotice::Disconnected { message });
            }

            event => {
                if let Err(e) = self.registry.apply(self.transport.as_ref(), &event).await {
                    warn!(
                        target: "ms.actor.session",
                        event = event.label(),
                        error = %e,
                        "Failed to apply transport event"
                    );
                    if let SessionError::Subscribe {
                        participant_id,
                        kind,
                        ..
                    } = &e
                    {
                        self.notify(SessionNotice::SubscribeFailed {
                            participant_id: participant_id.clone(),
                            kind: *kind,
                            message: e.notice_message(),
                        });
                    }
                }
            }
        }
    }

    /// Release everything and return to `Idle`.
    ///
    /// Local state is always reset. A disconnect error is returned after the
    /// reset.
    async fn teardown(
        &mut self,
        reason: &'static str,
        disconnect: bool,
    ) -> Result<(), SessionError> {
        self.set_phase(SessionPhase::Leaving);

        self.screen.release();
        self.tracks.release();
        self.registry.clear();
        self.discard_stale_events();

        let result = if disconnect {
            self.transport
                .disconnect()
                .await
                .map_err(SessionError::Transport)
        } else {
            Ok(())
        };

        self.session = None;
        self.set_phase(SessionPhase::Idle);
        self.publish_local_state();
        metrics::record_leave(reason);

        info!(
            target: "ms.actor.session",
            reason,
            disconnected = disconnect,
            "Session torn down"
        );
        result
    }

    async fn graceful_shutdown(&mut self) {
        if self.pending_join.is_some() {
            let outcome = settle(&mut self.pending_join).await;
            self.finish_join(outcome);
        }
        self.drain_deferred().await;

        if self.phase != SessionPhase::Idle {
            if let Err(e) = self.teardown("shutdown", true).await {
                warn!(
                    target: "ms.actor.session",
                    error = %e,
                    "Disconnect failed during shutdown"
                );
            }
        }

        self.pin_bridge.detach();
        self.receiver.close();
    }

    /// Drop every transport event already queued.
    fn discard_stale_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        let mut discarded = 0usize;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    metrics::record_transport_event(event.label());
                    discarded += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!(
                        target: "ms.actor.session",
                        "Transport event stream closed"
                    );
                    self.events = None;
                    break;
                }
            }
        }
        if discarded > 0 {
            debug!(
                target: "ms.actor.session",
                discarded,
                "Discarded transport events from a previous session"
            );
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.status_tx.send_replace(SessionStatus {
            phase,
            joined: phase == SessionPhase::Joined,
            session: self.session.clone(),
        });
    }

    fn publish_local_state(&self) {
        let snapshot = self.tracks.snapshot();
        let screen_published = usize::from(self.screen.is_published());
        metrics::set_published_tracks(snapshot.published_count() + screen_published);
        self.tracks_tx.send_replace(snapshot);
        self.screen_tx.send_replace(self.screen.state());
    }

    fn notify(&self, notice: SessionNotice) {
        // No subscribers is fine.
        let _ = self.notices_tx.send(notice);
    }
}

fn join_failure_status(error: &SessionError) -> &'static str {
    match error {
        SessionError::Connect(_) => "connect_error",
        SessionError::TrackAcquisition(_) => "track_error",
        SessionError::Transport(_) => "publish_error",
        _ => "error",
    }
}

async fn settle(pending: &mut Option<PendingJoin>) -> JoinOutcome {
    match pending.as_mut() {
        Some(join) => (&mut join.future).await,
        None => std::future::pending().await,
    }
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events.as_mut() {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_join(
    transport: Arc<dyn MediaTransport>,
    params: ConnectParams,
    mut tracks: LocalTrackSet,
    publish: bool,
    config: LocalTracksConfig,
) -> JoinOutcome {
    let result =
        connect_and_publish(transport.as_ref(), &params, &mut tracks, publish, &config).await;
    JoinOutcome { tracks, result }
}

async fn connect_and_publish(
    transport: &dyn MediaTransport,
    params: &ConnectParams,
    tracks: &mut LocalTrackSet,
    publish: bool,
    config: &LocalTracksConfig,
) -> Result<String, SessionError> {
    let local_participant_id = transport
        .connect(params)
        .await
        .map_err(SessionError::Connect)?;

    if !publish {
        return Ok(local_participant_id);
    }

    if let Err(e) = publish_local_tracks(transport, tracks, config).await {
        tracks.release();
        if let Err(disconnect_err) = transport.disconnect().await {
            warn!(
                target: "ms.actor.session",
                error = %disconnect_err,
                "Disconnect after failed publish also failed"
            );
        }
        return Err(e);
    }

    Ok(local_participant_id)
}

async fn publish_local_tracks(
    transport: &dyn MediaTransport,
    tracks: &mut LocalTrackSet,
    config: &LocalTracksConfig,
) -> Result<(), SessionError> {
    tracks.acquire(transport, config).await?;
    tracks.publish_all(transport).await
}
