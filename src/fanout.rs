//! Topic-addressed event fan-out.
//!
//! The transport is abstracted behind [`FanOut`]: the core only needs
//! `publish(topic, event, payload)`. The in-process [`BroadcastHub`] serves
//! same-process subscribers (and carries `join` with snapshot delivery); the
//! NATS implementation in `nats_fanout` serves multi-worker deployments.
//! Cycle publishes run concurrently; one slow or failing publish never
//! blocks the rest.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::observations::AircraftObservation;

/// Topics a client can subscribe to. `all` on the wire expands to every
/// real topic at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Aircraft,
    Positions,
    Airspace,
    Safety,
    Alerts,
    Acars,
    Audio,
    Stats,
}

impl Topic {
    pub const ALL: &'static [Topic] = &[
        Topic::Aircraft,
        Topic::Positions,
        Topic::Airspace,
        Topic::Safety,
        Topic::Alerts,
        Topic::Acars,
        Topic::Audio,
        Topic::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Aircraft => "aircraft",
            Topic::Positions => "positions",
            Topic::Airspace => "airspace",
            Topic::Safety => "safety",
            Topic::Alerts => "alerts",
            Topic::Acars => "acars",
            Topic::Audio => "audio",
            Topic::Stats => "stats",
        }
    }

    pub fn parse(raw: &str) -> Option<Topic> {
        Some(match raw.trim() {
            "aircraft" => Topic::Aircraft,
            "positions" => Topic::Positions,
            "airspace" => Topic::Airspace,
            "safety" => Topic::Safety,
            "alerts" => Topic::Alerts,
            "acars" => Topic::Acars,
            "audio" => Topic::Audio,
            "stats" => Topic::Stats,
            _ => return None,
        })
    }

    /// Expand a client topic list, resolving the `all` wildcard.
    pub fn parse_set(raw: &str) -> HashSet<Topic> {
        let mut topics = HashSet::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part == "all" {
                topics.extend(Topic::ALL.iter().copied());
            } else if let Some(topic) = Topic::parse(part) {
                topics.insert(topic);
            }
        }
        topics
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published event as subscribers see it
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub topic: Topic,
    pub event: String,
    pub payload: Value,
    pub timestamp: chrono::DateTime<Utc>,
}

/// The transport seam. Implementations: in-process broadcast, NATS.
#[async_trait]
pub trait FanOut: Send + Sync {
    async fn publish(&self, topic: Topic, event: &str, payload: Value) -> Result<()>;
}

/// Publish a batch concurrently across every transport. Failures are logged
/// and swallowed; the cycle always completes.
pub async fn publish_all(
    transports: &[Arc<dyn FanOut>],
    events: Vec<(Topic, String, Value)>,
) {
    let mut futures = Vec::with_capacity(events.len() * transports.len());
    for (topic, event, payload) in &events {
        for transport in transports {
            futures.push(async move {
                if let Err(e) = transport.publish(*topic, event, payload.clone()).await {
                    warn!("Fan-out publish {}:{} failed: {}", topic, event, e);
                }
            });
        }
    }
    join_all(futures).await;
}

/// In-process fan-out over a broadcast channel. Subscribers receive every
/// event and filter to their topic set; joining delivers the current
/// aircraft and safety snapshots first.
pub struct BroadcastHub {
    tx: broadcast::Sender<Arc<OutboundEvent>>,
    last_aircraft: RwLock<Vec<Value>>,
    last_safety: RwLock<Vec<Value>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        BroadcastHub {
            tx,
            last_aircraft: RwLock::new(Vec::new()),
            last_safety: RwLock::new(Vec::new()),
        }
    }

    /// Keep the snapshots that new subscribers receive on join.
    pub fn set_aircraft_snapshot(&self, aircraft: Vec<Value>) {
        *self.last_aircraft.write().expect("hub lock poisoned") = aircraft;
    }

    pub fn set_safety_snapshot(&self, events: Vec<Value>) {
        *self.last_safety.write().expect("hub lock poisoned") = events;
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Join a topic set. Returns the snapshot events the subscriber should
    /// see immediately plus the live stream.
    pub fn join(&self, topics: HashSet<Topic>) -> (Vec<OutboundEvent>, TopicStream) {
        let now = Utc::now();
        let mut initial = Vec::new();

        if topics.contains(&Topic::Aircraft) {
            let aircraft = self.last_aircraft.read().expect("hub lock poisoned").clone();
            let count = aircraft.len();
            initial.push(OutboundEvent {
                topic: Topic::Aircraft,
                event: "snapshot".to_string(),
                payload: json!({"aircraft": aircraft, "count": count}),
                timestamp: now,
            });
        }
        if topics.contains(&Topic::Positions) {
            let aircraft = self.last_aircraft.read().expect("hub lock poisoned").clone();
            initial.push(OutboundEvent {
                topic: Topic::Positions,
                event: "snapshot".to_string(),
                payload: json!({"aircraft": aircraft}),
                timestamp: now,
            });
        }
        if topics.contains(&Topic::Safety) {
            let events = self.last_safety.read().expect("hub lock poisoned").clone();
            let count = events.len();
            initial.push(OutboundEvent {
                topic: Topic::Safety,
                event: "snapshot".to_string(),
                payload: json!({"events": events, "count": count}),
                timestamp: now,
            });
        }

        debug!("Subscriber joined {} topics", topics.len());
        metrics::gauge!("fanout.subscribers").set(self.tx.receiver_count() as f64 + 1.0);

        (
            initial,
            TopicStream {
                topics,
                rx: self.tx.subscribe(),
            },
        )
    }
}

#[async_trait]
impl FanOut for BroadcastHub {
    async fn publish(&self, topic: Topic, event: &str, payload: Value) -> Result<()> {
        // No receivers is normal; only delivery to someone counts
        let _ = self.tx.send(Arc::new(OutboundEvent {
            topic,
            event: event.to_string(),
            payload,
            timestamp: Utc::now(),
        }));
        metrics::counter!("fanout.published_total", "topic" => topic.as_str()).increment(1);
        Ok(())
    }
}

/// A subscriber's filtered view of the hub stream
pub struct TopicStream {
    topics: HashSet<Topic>,
    rx: broadcast::Receiver<Arc<OutboundEvent>>,
}

impl TopicStream {
    /// Next event on a subscribed topic. Lagged slots (slow consumer) are
    /// skipped rather than surfaced as errors.
    pub async fn recv(&mut self) -> Option<Arc<OutboundEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.topics.contains(&event.topic) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Aircraft-stream thresholds: suppress updates for jitter smaller than
/// roughly 100 m / 100 ft / 5 degrees
fn has_significant_change(old: &AircraftObservation, new: &AircraftObservation) -> bool {
    if let (Some(old_lat), Some(new_lat)) = (old.lat, new.lat)
        && (old_lat - new_lat).abs() > 0.001
    {
        return true;
    }
    if let (Some(old_lon), Some(new_lon)) = (old.lon, new.lon)
        && (old_lon - new_lon).abs() > 0.001
    {
        return true;
    }

    let old_alt = old.altitude_baro.unwrap_or(0);
    let new_alt = new.altitude_baro.unwrap_or(0);
    if (old_alt - new_alt).abs() > 100 {
        return true;
    }

    if let (Some(old_track), Some(new_track)) = (old.track, new.track) {
        let diff = (old_track - new_track).abs();
        let diff = diff.min(360.0 - diff);
        if diff > 5.0 {
            return true;
        }
    }

    old.squawk != new.squawk
}

/// Position-stream thresholds, much tighter for smooth map rendering:
/// ~11 m / 25 ft / 1 degree / 5 kt
fn has_position_change(old: &PositionSample, new: &PositionSample) -> bool {
    if (old.lat - new.lat).abs() > 0.0001 || (old.lon - new.lon).abs() > 0.0001 {
        return true;
    }
    if (old.alt.unwrap_or(0) - new.alt.unwrap_or(0)).abs() > 25 {
        return true;
    }
    if let (Some(old_track), Some(new_track)) = (old.track, new.track) {
        let diff = (old_track - new_track).abs();
        let diff = diff.min(360.0 - diff);
        if diff > 1.0 {
            return true;
        }
    }
    (old.gs.unwrap_or(0.0) - new.gs.unwrap_or(0.0)).abs() > 5.0
}

#[derive(Debug, Clone)]
struct PositionSample {
    lat: f64,
    lon: f64,
    alt: Option<i32>,
    track: Option<f64>,
    gs: Option<f64>,
    vr: Option<i32>,
}

impl PositionSample {
    fn from_observation(obs: &AircraftObservation) -> Option<Self> {
        if !obs.has_position() {
            return None;
        }
        Some(PositionSample {
            lat: obs.lat?,
            lon: obs.lon?,
            alt: obs.altitude_baro,
            track: obs.track,
            gs: obs.ground_speed,
            vr: obs.vertical_rate,
        })
    }

    fn payload(&self) -> Value {
        json!({
            "lat": self.lat,
            "lon": self.lon,
            "alt": self.alt,
            "track": self.track,
            "gs": self.gs,
            "vr": self.vr,
        })
    }
}

/// The per-cycle diff against the previous aircraft picture
#[derive(Debug, Default)]
pub struct CycleDiff {
    pub new: Vec<AircraftObservation>,
    pub updated: Vec<AircraftObservation>,
    pub removed: Vec<String>,
    pub positions_updated: HashMap<String, Value>,
    pub positions_removed: Vec<String>,
    pub count: usize,
}

/// Change-detection state for the aircraft and positions streams. Owned by
/// the pipeline; one instance per process.
#[derive(Default)]
pub struct AircraftStream {
    last_aircraft: HashMap<String, AircraftObservation>,
    last_positions: HashMap<String, PositionSample>,
}

impl AircraftStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one poll cycle into the stream state and compute the outbound
    /// diff.
    pub fn diff(&mut self, observations: &[AircraftObservation]) -> CycleDiff {
        let mut diff = CycleDiff::default();
        let mut current: HashMap<String, AircraftObservation> = HashMap::new();
        let mut current_positions: HashMap<String, PositionSample> = HashMap::new();

        for obs in observations {
            match self.last_aircraft.get(&obs.icao) {
                None => diff.new.push(obs.clone()),
                Some(old) if has_significant_change(old, obs) => diff.updated.push(obs.clone()),
                Some(_) => {}
            }
            current.insert(obs.icao.clone(), obs.clone());

            if let Some(sample) = PositionSample::from_observation(obs) {
                let changed = match self.last_positions.get(&obs.icao) {
                    None => true,
                    Some(old) => has_position_change(old, &sample),
                };
                if changed {
                    diff.positions_updated
                        .insert(obs.icao.clone(), sample.payload());
                }
                current_positions.insert(obs.icao.clone(), sample);
            }
        }

        for icao in self.last_aircraft.keys() {
            if !current.contains_key(icao) {
                diff.removed.push(icao.clone());
            }
        }
        for icao in self.last_positions.keys() {
            if !current_positions.contains_key(icao) {
                diff.positions_removed.push(icao.clone());
            }
        }

        diff.count = current.len();
        self.last_aircraft = current;
        self.last_positions = current_positions;
        diff
    }
}

/// Turn a cycle diff into the publish batch: new/update/remove when
/// non-empty, a heartbeat always, and a positions delta only when something
/// moved.
pub fn cycle_events(diff: &CycleDiff, feeder_lat: f64, feeder_lon: f64) -> Vec<(Topic, String, Value)> {
    let timestamp = Utc::now().to_rfc3339();
    let mut events = Vec::new();

    if !diff.new.is_empty() {
        events.push((
            Topic::Aircraft,
            "new".to_string(),
            json!({
                "aircraft": diff.new.iter().map(|o| o.simplified(feeder_lat, feeder_lon)).collect::<Vec<_>>(),
                "timestamp": &timestamp,
            }),
        ));
    }
    if !diff.updated.is_empty() {
        events.push((
            Topic::Aircraft,
            "update".to_string(),
            json!({
                "aircraft": diff.updated.iter().map(|o| o.simplified(feeder_lat, feeder_lon)).collect::<Vec<_>>(),
                "timestamp": &timestamp,
            }),
        ));
    }
    if !diff.removed.is_empty() {
        events.push((
            Topic::Aircraft,
            "remove".to_string(),
            json!({"icaos": &diff.removed, "timestamp": &timestamp}),
        ));
    }

    events.push((
        Topic::Aircraft,
        "heartbeat".to_string(),
        json!({"count": diff.count, "timestamp": &timestamp}),
    ));

    if !diff.positions_updated.is_empty() || !diff.positions_removed.is_empty() {
        events.push((
            Topic::Positions,
            "update".to_string(),
            json!({
                "positions": &diff.positions_updated,
                "removed": &diff.positions_removed,
                "timestamp": &timestamp,
            }),
        ));
    }

    events
}
