//! Media session demo
//!
//! Runs the orchestrator against the in-process loopback engine.
//!
//! # Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Spawn the session actor with the loopback transport and pin signal
//! 4. Join the configured channel
//! 5. Simulate a remote participant and a pin announcement
//! 6. Wait for Ctrl+C, leave, shut down and dump metrics

#![warn(clippy::pedantic)]

use std::sync::Arc;

use media_session::actors::SessionActor;
use media_session::config::Config;
use media_session::observability::init_metrics_recorder;
use media_session::pinning::LocalPinSignal;
use media_session::transport::loopback::LoopbackTransport;
use media_session::transport::{MediaKind, MediaTransport, TransportEvent};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Participant simulated by the loopback engine.
const DEMO_REMOTE_PARTICIPANT: &str = "loopback-remote";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting media session demo");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        channel = %config.channel,
        participant_id = ?config.participant_id,
        publish = config.publish,
        screen_encoder_preset = %config.screen_encoder_preset,
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let transport = Arc::new(LoopbackTransport::new());
    let pin_signal = LocalPinSignal::new();
    let cancel_token = CancellationToken::new();

    let (session, actor_task) = SessionActor::spawn(
        Arc::clone(&transport) as Arc<dyn MediaTransport>,
        Arc::new(pin_signal.clone()),
        config.session_options(),
        cancel_token.clone(),
    );

    let joined = session.join(config.join_request()).await.map_err(|e| {
        error!(error = %e, "Join failed");
        e
    })?;
    info!(
        local_participant_id = %joined.local_participant_id,
        published = joined.published,
        "Session joined"
    );

    for event in [
        TransportEvent::ParticipantJoined {
            participant_id: DEMO_REMOTE_PARTICIPANT.to_string(),
        },
        TransportEvent::TrackPublished {
            participant_id: DEMO_REMOTE_PARTICIPANT.to_string(),
            kind: MediaKind::Audio,
        },
        TransportEvent::TrackPublished {
            participant_id: DEMO_REMOTE_PARTICIPANT.to_string(),
            kind: MediaKind::Video,
        },
    ] {
        transport.inject(event);
    }
    pin_signal.emit(DEMO_REMOTE_PARTICIPANT);

    let mut remote = session.watch_remote_participants();
    let mut notices = session.notices();

    info!(
        status = %serde_json::to_string(&session.status())?,
        local_tracks = %serde_json::to_string(&session.local_tracks())?,
        "Waiting for Ctrl+C"
    );

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
                }
                break;
            }
            changed = remote.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&remote.borrow_and_update());
                info!(
                    remote_participants = %serde_json::to_string(&*snapshot)?,
                    "Remote participants changed"
                );
                let pinned = session.pinned_media().await?;
                info!(
                    pinned = %serde_json::to_string(&pinned)?,
                    "Pinned media"
                );
            }
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    warn!(notice = %serde_json::to_string(&notice)?, "Session notice");
                }
            }
        }
    }

    info!("Leaving session");
    if let Err(e) = session.leave().await {
        warn!(error = %e, "Leave reported an error");
    }

    session.shutdown().await;
    if let Err(e) = actor_task.await {
        error!(error = %e, "Session actor task failed");
    }

    info!(metrics = %prometheus_handle.render(), "Final metrics");
    info!("Media session demo stopped");
    Ok(())
}
