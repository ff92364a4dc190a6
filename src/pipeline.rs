//! The per-cycle processing path.
//!
//! Each poll cycle flows: process_aircraft_data (sightings, sessions, alert
//! evaluation for newly opened sessions) -> SafetyMonitor -> FanOut. The
//! store step is gated by its own longer interval; safety and fan-out run on
//! every cycle. Storage failures are logged and dropped so the next cycle
//! always proceeds.

use chrono::Utc;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::acars::AcarsMessage;
use crate::acars_messages_repo::AcarsMessagesRepository;
use crate::alert_history_repo::AlertHistoryRepository;
use crate::alert_rules_repo::AlertRulesRepository;
use crate::alerts::{AlertEngine, AlertFire};
use crate::fanout::{self, AircraftStream, BroadcastHub, FanOut, Topic};
use crate::notifications::{NotificationRequest, NotifyType};
use crate::observations::AircraftObservation;
use crate::safety::{SafetyMonitor, Severity};
use crate::safety_events_repo::SafetyEventsRepository;
use crate::session_tracker::SessionTracker;
use crate::settings::Settings;
use crate::sightings::AircraftSighting;
use crate::sightings_repo::SightingsRepository;

pub struct AircraftPipeline {
    feeder_lat: f64,
    feeder_lon: f64,
    db_store_interval: std::time::Duration,

    sightings_repo: SightingsRepository,
    session_tracker: SessionTracker,

    alert_engine: Arc<AlertEngine>,
    alert_rules_repo: AlertRulesRepository,
    alert_history_repo: AlertHistoryRepository,

    safety_monitor: Arc<SafetyMonitor>,
    safety_events_repo: SafetyEventsRepository,

    hub: Arc<BroadcastHub>,
    transports: Vec<Arc<dyn FanOut>>,
    stream: Mutex<AircraftStream>,

    acars_messages_repo: AcarsMessagesRepository,

    webhook_client: reqwest::Client,
    notifications: Option<flume::Sender<NotificationRequest>>,

    last_store: Mutex<Option<Instant>>,
}

impl AircraftPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: &Settings,
        sightings_repo: SightingsRepository,
        session_tracker: SessionTracker,
        alert_engine: Arc<AlertEngine>,
        alert_rules_repo: AlertRulesRepository,
        alert_history_repo: AlertHistoryRepository,
        safety_monitor: Arc<SafetyMonitor>,
        safety_events_repo: SafetyEventsRepository,
        hub: Arc<BroadcastHub>,
        transports: Vec<Arc<dyn FanOut>>,
        acars_messages_repo: AcarsMessagesRepository,
        notifications: Option<flume::Sender<NotificationRequest>>,
    ) -> Self {
        let webhook_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        AircraftPipeline {
            feeder_lat: settings.feeder_lat,
            feeder_lon: settings.feeder_lon,
            db_store_interval: std::time::Duration::from_secs(settings.db_store_interval),
            sightings_repo,
            session_tracker,
            alert_engine,
            alert_rules_repo,
            alert_history_repo,
            safety_monitor,
            safety_events_repo,
            hub,
            transports,
            stream: Mutex::new(AircraftStream::new()),
            acars_messages_repo,
            webhook_client,
            notifications,
            last_store: Mutex::new(None),
        }
    }

    /// One poll cycle. Never returns an error: every failure inside is
    /// logged and the cycle completes.
    pub async fn process_cycle(&self, observations: Vec<AircraftObservation>) {
        let cycle_start = Instant::now();

        if self.store_due() && !observations.is_empty() {
            self.process_aircraft_data(&observations).await;
        }

        if !observations.is_empty() {
            self.run_safety(&observations).await;
        }

        self.publish_cycle(&observations).await;

        metrics::histogram!("pipeline.cycle_ms")
            .record(cycle_start.elapsed().as_micros() as f64 / 1000.0);
    }

    /// Check-and-arm the store gate. Observations between stores still flow
    /// to safety, alerts on stored cycles, and fan-out.
    fn store_due(&self) -> bool {
        let mut last_store = self.last_store.lock().expect("store gate lock poisoned");
        match *last_store {
            Some(last) if last.elapsed() < self.db_store_interval => false,
            _ => {
                *last_store = Some(Instant::now());
                true
            }
        }
    }

    /// Persist sightings and sessions; evaluate alert rules for aircraft
    /// that just opened a session.
    async fn process_aircraft_data(&self, observations: &[AircraftObservation]) {
        // Rules are read-mostly; rebuild the compiled snapshot only after a
        // CRUD invalidated it
        if self.alert_engine.is_stale() {
            match self.alert_rules_repo.get_enabled().await {
                Ok(rules) => self.alert_engine.install_rules(&rules),
                Err(e) => warn!("Failed to load alert rules, keeping stale snapshot: {}", e),
            }
        }

        let mut sightings = Vec::with_capacity(observations.len());

        for obs in observations {
            let distance_nm = obs.distance_from(self.feeder_lat, self.feeder_lon);
            sightings.push(AircraftSighting::from_observation(obs, distance_nm));

            let Some(tracked) = self.session_tracker.track(obs, distance_nm).await else {
                continue;
            };

            // Alerts fire once per session so the same aircraft loitering in
            // range doesn't retrigger every store cycle; the session insert
            // above also means the session id is durable before fan-out
            // observes the alert
            if tracked.newly_opened {
                for fire in self.alert_engine.check_aircraft(obs, distance_nm) {
                    self.handle_alert_fire(fire).await;
                }
            }
        }

        if let Err(e) = self.sightings_repo.insert_batch(sightings).await {
            error!("Failed to store sightings batch: {}", e);
        }
    }

    async fn handle_alert_fire(&self, fire: AlertFire) {
        info!("Alert '{}' fired for {}", fire.rule_name, fire.icao);

        if let Err(e) = self.alert_history_repo.insert(&fire).await {
            error!("Failed to store alert history: {}", e);
        }
        if let Err(e) = self
            .alert_rules_repo
            .set_last_triggered(fire.rule_id, fire.triggered_at)
            .await
        {
            warn!("Failed to update rule last_triggered: {}", e);
        }

        fanout::publish_all(
            &self.transports,
            vec![(
                Topic::Alerts,
                "triggered".to_string(),
                json!({
                    "rule_id": fire.rule_id,
                    "rule_name": &fire.rule_name,
                    "icao": &fire.icao,
                    "callsign": &fire.callsign,
                    "message": &fire.message,
                    "priority": &fire.priority,
                    "aircraft_data": &fire.aircraft_data,
                    "timestamp": fire.triggered_at.to_rfc3339(),
                }),
            )],
        )
        .await;

        if let Some(url) = fire.api_url.clone() {
            self.spawn_webhook(url, &fire);
        }

        self.enqueue_notification(NotificationRequest {
            title: format!("Alert: {}", fire.rule_name),
            body: fire.message.clone(),
            notify_type: NotifyType::from_priority(&fire.priority),
            key: format!("alert:{}:{}", fire.rule_id, fire.icao),
            icao: Some(fire.icao.clone()),
        });
    }

    /// Fire-and-forget webhook POST; failure is logged, never retried.
    fn spawn_webhook(&self, url: String, fire: &AlertFire) {
        let client = self.webhook_client.clone();
        let body = json!({
            "rule_name": &fire.rule_name,
            "message": &fire.message,
            "priority": &fire.priority,
            "icao": &fire.icao,
            "callsign": &fire.callsign,
            "aircraft_data": &fire.aircraft_data,
            "triggered_at": fire.triggered_at.to_rfc3339(),
        });
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!("Webhook {} returned {}", url, response.status());
                }
                Err(e) => warn!("Webhook {} failed: {}", url, e),
                _ => debug!("Webhook {} delivered", url),
            }
        });
    }

    fn enqueue_notification(&self, request: NotificationRequest) {
        if let Some(tx) = &self.notifications
            && let Err(e) = tx.try_send(request)
        {
            warn!("Notification queue full, dropping: {}", e);
        }
    }

    /// Run the detectors and persist/publish whatever fired.
    async fn run_safety(&self, observations: &[AircraftObservation]) {
        if !self.safety_monitor.enabled() {
            return;
        }

        let events = self.safety_monitor.update_aircraft(observations);
        for mut event in events {
            match event.db_id {
                None => match self.safety_events_repo.insert(&event).await {
                    Ok(db_id) => {
                        self.safety_monitor.set_db_id(&event.id, db_id);
                        event.db_id = Some(db_id);
                    }
                    Err(e) => error!("Failed to store safety event {}: {}", event.id, e),
                },
                Some(db_id) => {
                    if let Err(e) = self
                        .safety_events_repo
                        .refresh(db_id, event.last_seen, event.severity.as_str(), &event.message)
                        .await
                    {
                        warn!("Failed to refresh safety event {}: {}", event.id, e);
                    }
                }
            }

            warn!("Safety event: {} - {}", event.event_type, event.message);

            fanout::publish_all(
                &self.transports,
                vec![(
                    Topic::Safety,
                    "event".to_string(),
                    json!({
                        "id": &event.id,
                        "db_id": event.db_id,
                        "event_type": event.event_type,
                        "severity": event.severity,
                        "icao": &event.icao,
                        "icao_2": &event.icao_2,
                        "callsign": &event.callsign,
                        "callsign_2": &event.callsign_2,
                        "message": &event.message,
                        "details": &event.details,
                        "aircraft_snapshot": &event.aircraft_snapshot,
                        "aircraft_snapshot_2": &event.aircraft_snapshot_2,
                        "acknowledged": event.acknowledged,
                        "timestamp": Utc::now().to_rfc3339(),
                    }),
                )],
            )
            .await;

            if event.severity == Severity::Critical {
                self.enqueue_notification(NotificationRequest {
                    title: format!("Safety: {}", event.event_type),
                    body: event.message.clone(),
                    notify_type: NotifyType::Failure,
                    key: format!("safety:{}:{}", event.event_type, event.icao),
                    icao: Some(event.icao.clone()),
                });
            }
        }
    }

    /// Diff the aircraft picture and broadcast the cycle's fan-out batch.
    async fn publish_cycle(&self, observations: &[AircraftObservation]) {
        let diff = {
            let mut stream = self.stream.lock().expect("aircraft stream lock poisoned");
            stream.diff(observations)
        };

        // Keep the join-time snapshots current
        self.hub.set_aircraft_snapshot(
            observations
                .iter()
                .map(|o| o.simplified(self.feeder_lat, self.feeder_lon))
                .collect(),
        );
        self.hub.set_safety_snapshot(
            self.safety_monitor
                .active_events(true)
                .iter()
                .map(|e| serde_json::to_value(e).unwrap_or_default())
                .collect(),
        );

        let events = fanout::cycle_events(&diff, self.feeder_lat, self.feeder_lon);
        fanout::publish_all(&self.transports, events).await;
    }

    /// One enriched ACARS/VDL2 message: store and fan out. Called from the
    /// listener consumer task in wire-arrival order.
    pub async fn handle_acars_message(&self, msg: AcarsMessage) {
        if let Err(e) = self.acars_messages_repo.insert(&msg).await {
            error!("Failed to store ACARS message: {}", e);
        }

        let payload = serde_json::to_value(&msg).unwrap_or_default();
        let mut events = vec![(Topic::Acars, "message".to_string(), payload.clone())];
        // Per-aircraft addressing rides the event name, mirroring the
        // per-aircraft NATS subjects
        if let Some(icao) = &msg.icao_hex {
            events.push((Topic::Acars, format!("message/{}", icao), payload));
        }
        fanout::publish_all(&self.transports, events).await;
    }

    /// Expose the safety monitor for the operator surface.
    pub fn safety_monitor(&self) -> &Arc<SafetyMonitor> {
        &self.safety_monitor
    }
}

/// Consume enriched ACARS messages from the listeners until the channel
/// closes.
pub async fn run_acars_consumer(
    pipeline: Arc<AircraftPipeline>,
    rx: flume::Receiver<AcarsMessage>,
) {
    info!("ACARS consumer started");
    while let Ok(msg) = rx.recv_async().await {
        pipeline.handle_acars_message(msg).await;
    }
    info!("ACARS consumer stopped");
}
