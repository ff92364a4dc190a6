//! The `run` subcommand: the composition root.
//!
//! Builds every component, wires the pipeline, spawns the background tasks
//! (poller, session sweeper, ACARS listeners and consumer, notification
//! worker, metrics server), then waits for a shutdown signal and gives the
//! tasks a short grace period to drain.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::{info, warn};

use crate::acars::{self, AcarsService};
use crate::acars_messages_repo::AcarsMessagesRepository;
use crate::alert_history_repo::AlertHistoryRepository;
use crate::alert_rules_repo::AlertRulesRepository;
use crate::alerts::AlertEngine;
use crate::db;
use crate::fanout::{BroadcastHub, FanOut};
use crate::nats_fanout::NatsFanOut;
use crate::notifications::{self, Notifier};
use crate::notifications_repo::{NotificationConfigRepository, NotificationLogRepository};
use crate::pipeline::{self, AircraftPipeline};
use crate::poller::{self, AircraftPoller};
use crate::safety::{SafetyMonitor, SafetyThresholds};
use crate::safety_events_repo::SafetyEventsRepository;
use crate::session_tracker::SessionTracker;
use crate::sessions_repo::SessionsRepository;
use crate::settings::Settings;
use crate::sightings_repo::SightingsRepository;

/// How long background tasks get to drain after the shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

pub async fn handle_run(settings: Settings) -> Result<()> {
    info!(
        "Starting skywatch (feeder {:.4}, {:.4}; poll every {}s, store every {}s)",
        settings.feeder_lat,
        settings.feeder_lon,
        settings.polling_interval,
        settings.db_store_interval
    );

    let pool = db::create_pool(&settings.database_url)?;
    let shutdown = CancellationToken::new();

    // Metrics must be installed before the first counter is touched
    if settings.metrics_port > 0 {
        let port = settings.metrics_port;
        tokio::spawn(
            async move {
                crate::metrics::start_metrics_server(port).await;
            }
            .instrument(tracing::info_span!("metrics_server")),
        );
        // The recorder installs inside the server task; give it a beat
        tokio::time::sleep(Duration::from_millis(50)).await;
        crate::metrics::initialize_pipeline_metrics();
    }

    // Fan-out transports: the in-process hub always, NATS when configured
    let hub = Arc::new(BroadcastHub::new());
    let mut transports: Vec<Arc<dyn FanOut>> = vec![hub.clone()];
    if let Some(nats_url) = &settings.nats_url {
        match NatsFanOut::connect(nats_url).await {
            Ok(nats) => transports.push(Arc::new(nats)),
            Err(e) => warn!("NATS unavailable ({}); continuing with in-process fan-out only", e),
        }
    }

    // Notification egress, seeded from settings on first run
    let config_repo = NotificationConfigRepository::new(pool.clone());
    if let Err(e) = config_repo
        .ensure_seeded(&settings.apprise_urls, settings.notification_cooldown)
        .await
    {
        warn!("Failed to seed notification config: {}", e);
    }
    let (urls, cooldown) = match config_repo.get().await {
        Ok(Some(config)) => (
            serde_json::from_value::<Vec<String>>(config.apprise_urls)
                .unwrap_or_else(|_| settings.apprise_urls.clone()),
            config.cooldown_seconds as u64,
        ),
        _ => (settings.apprise_urls.clone(), settings.notification_cooldown),
    };
    let notifier = Arc::new(
        Notifier::new(urls, cooldown)
            .with_log_repo(NotificationLogRepository::new(pool.clone())),
    );
    let notifications_tx = notifier
        .enabled()
        .then(|| notifications::start_worker(notifier.clone(), shutdown.clone()));

    // Core components
    let session_tracker = SessionTracker::new(SessionsRepository::new(pool.clone()));
    session_tracker.start_sweeper(shutdown.clone());

    let safety_monitor = Arc::new(SafetyMonitor::new(
        SafetyThresholds::from_settings(&settings),
        settings.safety_enabled,
    ));
    let alert_engine = Arc::new(AlertEngine::new());

    let pipeline = Arc::new(AircraftPipeline::new(
        &settings,
        SightingsRepository::new(pool.clone()),
        session_tracker,
        alert_engine,
        AlertRulesRepository::new(pool.clone()),
        AlertHistoryRepository::new(pool.clone()),
        safety_monitor,
        SafetyEventsRepository::new(pool.clone()),
        hub,
        transports,
        AcarsMessagesRepository::new(pool.clone()),
        notifications_tx,
    ));

    // ACARS/VDL2 ingest
    if settings.acars_enabled {
        let service = Arc::new(AcarsService::new());
        let rx = acars::start_listeners(
            service,
            settings.acars_port,
            settings.vdlm2_port,
            shutdown.clone(),
        );
        let acars_pipeline = pipeline.clone();
        tokio::spawn(
            async move {
                pipeline::run_acars_consumer(acars_pipeline, rx).await;
            }
            .instrument(tracing::info_span!("acars_consumer")),
        );
        info!(
            "ACARS service started (acars udp/{}, vdlm2 udp/{})",
            settings.acars_port, settings.vdlm2_port
        );
    } else {
        info!("ACARS service disabled");
    }

    // The poller drives everything else
    poller::start(AircraftPoller::new(&settings), pipeline, shutdown.clone());

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!("Shutdown complete");

    Ok(())
}
