//! Safety event detection over the live aircraft picture.
//!
//! Each poll cycle the monitor consumes the full aircraft list, runs four
//! detectors (emergency squawk, extreme vertical rate, vertical-rate
//! reversal, pairwise proximity), and maintains the table of active events
//! with stable identities, refresh semantics, cooldowns, and an
//! acknowledgment overlay.

mod airports;
mod events;
mod proximity;
mod vertical;

pub use events::{EventDraft, EventType, SafetyEvent, Severity, event_key};

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use crate::observations::AircraftObservation;
use crate::settings::Settings;

/// Seconds a cooldown suppresses re-emission of the same event key
const EVENT_COOLDOWN_SECS: i64 = 60;
/// Seconds of per-aircraft history retained for the reversal detector
const HISTORY_RETENTION_SECS: i64 = 30;
/// Seconds after which an unrefreshed event expires
const EVENT_EXPIRY_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct SafetyThresholds {
    pub vs_change: i32,
    pub vs_extreme: i32,
    pub tcas_vs: i32,
    pub proximity_nm: f64,
    pub altitude_diff_ft: i32,
}

impl SafetyThresholds {
    pub fn from_settings(settings: &Settings) -> Self {
        SafetyThresholds {
            vs_change: settings.safety_vs_change_threshold,
            vs_extreme: settings.safety_vs_extreme_threshold,
            tcas_vs: settings.safety_tcas_vs_threshold,
            proximity_nm: settings.safety_proximity_nm,
            altitude_diff_ft: settings.safety_altitude_diff_ft,
        }
    }
}

/// Retained per-aircraft kinematic history
#[derive(Debug, Default)]
struct AircraftState {
    vs_history: Vec<(DateTime<Utc>, i32)>,
    alt_history: Vec<(DateTime<Utc>, i32)>,
    last_update: DateTime<Utc>,
}

#[derive(Default)]
struct MonitorInner {
    aircraft_state: HashMap<String, AircraftState>,
    cooldowns: HashMap<String, DateTime<Utc>>,
    active_events: HashMap<String, SafetyEvent>,
}

/// Per-severity counts and sizing for the statistics surface
#[derive(Debug, Clone, serde::Serialize)]
pub struct SafetyStats {
    pub tracked_aircraft: usize,
    pub active_cooldowns: usize,
    pub monitoring_enabled: bool,
    pub active_events: usize,
    pub acknowledged_events: usize,
    pub critical: usize,
    pub warning: usize,
    pub low: usize,
}

pub struct SafetyMonitor {
    thresholds: SafetyThresholds,
    enabled: AtomicBool,
    inner: Mutex<MonitorInner>,
}

impl SafetyMonitor {
    pub fn new(thresholds: SafetyThresholds, enabled: bool) -> Self {
        SafetyMonitor {
            thresholds,
            enabled: AtomicBool::new(enabled),
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, value: bool) {
        self.enabled.store(value, Ordering::Relaxed);
        info!(
            "Safety monitoring {}",
            if value { "enabled" } else { "disabled" }
        );
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// Run all detectors over the current aircraft list and return the
    /// stored (new or refreshed) events for this cycle.
    pub fn update_aircraft(&self, observations: &[AircraftObservation]) -> Vec<SafetyEvent> {
        self.update_aircraft_at(observations, Utc::now())
    }

    /// Clock-injected variant of [`update_aircraft`](Self::update_aircraft);
    /// detector timing (reversal lookback, cooldowns, expiry) is measured
    /// against `now`.
    pub fn update_aircraft_at(
        &self,
        observations: &[AircraftObservation],
        now: DateTime<Utc>,
    ) -> Vec<SafetyEvent> {
        if !self.enabled() {
            return Vec::new();
        }

        self.cleanup(now);

        let mut drafts: Vec<EventDraft> = Vec::new();
        let mut guard = self.inner.lock().expect("safety monitor lock poisoned");
        let inner = &mut *guard;

        for obs in observations {
            // Emergency squawks bypass cooldown entirely; the stable event
            // key deduplicates repeated cycles
            if let Some(draft) = vertical::check_emergency_squawk(obs) {
                drafts.push(draft);
            }

            if let Some(draft) = vertical::check_extreme_vs(obs, &self.thresholds)
                && Self::can_trigger(&inner.cooldowns, &draft, now)
            {
                Self::mark_triggered(&mut inner.cooldowns, &draft, now);
                drafts.push(draft);
            }

            // Reversal compares against history that does not yet include
            // this cycle's sample
            if let Some(state) = inner.aircraft_state.get(&obs.icao)
                && let Some(draft) =
                    vertical::check_vs_reversal(obs, &state.vs_history, &self.thresholds, now)
                && Self::can_trigger(&inner.cooldowns, &draft, now)
            {
                Self::mark_triggered(&mut inner.cooldowns, &draft, now);
                drafts.push(draft);
            }

            Self::update_state(&mut inner.aircraft_state, obs, now);
        }

        for draft in proximity::check_proximity_conflicts(observations, &self.thresholds) {
            if Self::can_trigger(&inner.cooldowns, &draft, now) {
                Self::mark_triggered(&mut inner.cooldowns, &draft, now);
                drafts.push(draft);
            }
        }

        let events: Vec<SafetyEvent> = drafts
            .into_iter()
            .map(|draft| Self::store_event(&mut inner.active_events, draft, now))
            .collect();

        metrics::gauge!("safety.tracked_aircraft").set(inner.aircraft_state.len() as f64);
        metrics::gauge!("safety.active_events").set(inner.active_events.len() as f64);
        if !events.is_empty() {
            metrics::counter!("safety.events_emitted_total").increment(events.len() as u64);
        }

        events
    }

    fn can_trigger(
        cooldowns: &HashMap<String, DateTime<Utc>>,
        draft: &EventDraft,
        now: DateTime<Utc>,
    ) -> bool {
        if draft.event_type.bypasses_cooldown() {
            return true;
        }
        match cooldowns.get(&draft.key()) {
            Some(last) => now.signed_duration_since(*last) > Duration::seconds(EVENT_COOLDOWN_SECS),
            None => true,
        }
    }

    fn mark_triggered(
        cooldowns: &mut HashMap<String, DateTime<Utc>>,
        draft: &EventDraft,
        now: DateTime<Utc>,
    ) {
        if !draft.event_type.bypasses_cooldown() {
            cooldowns.insert(draft.key(), now);
        }
    }

    fn update_state(
        states: &mut HashMap<String, AircraftState>,
        obs: &AircraftObservation,
        now: DateTime<Utc>,
    ) {
        let state = states.entry(obs.icao.clone()).or_default();
        state.last_update = now;

        let retention = Duration::seconds(HISTORY_RETENTION_SECS);
        if let Some(vr) = obs.vertical_rate {
            state.vs_history.push((now, vr));
            state
                .vs_history
                .retain(|(t, _)| now.signed_duration_since(*t) < retention);
        }
        if let Some(alt) = obs.altitude() {
            state.alt_history.push((now, alt));
            state
                .alt_history
                .retain(|(t, _)| now.signed_duration_since(*t) < retention);
        }
    }

    /// Insert a new event or refresh the existing one with the same key.
    fn store_event(
        events: &mut HashMap<String, SafetyEvent>,
        draft: EventDraft,
        now: DateTime<Utc>,
    ) -> SafetyEvent {
        let key = draft.key();
        match events.get_mut(&key) {
            Some(existing) => {
                existing.refresh(draft, now);
                existing.clone()
            }
            None => {
                let event = SafetyEvent::from_draft(draft, now);
                events.insert(key, event.clone());
                event
            }
        }
    }

    /// Drop aged aircraft state, spent cooldowns, and expired events.
    fn cleanup(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");

        let state_cutoff = now - Duration::seconds(HISTORY_RETENTION_SECS);
        inner
            .aircraft_state
            .retain(|_, state| state.last_update >= state_cutoff);

        let cooldown_cutoff = now - Duration::seconds(EVENT_COOLDOWN_SECS);
        inner.cooldowns.retain(|_, last| *last >= cooldown_cutoff);

        let event_cutoff = now - Duration::seconds(EVENT_EXPIRY_SECS);
        let before = inner.active_events.len();
        inner
            .active_events
            .retain(|_, event| event.last_seen >= event_cutoff);
        let expired = before - inner.active_events.len();
        if expired > 0 {
            debug!("Expired {} safety events", expired);
            metrics::counter!("safety.events_expired_total").increment(expired as u64);
        }
    }

    /// Attach the durable row id once the event has been stored.
    pub fn set_db_id(&self, event_id: &str, db_id: Uuid) {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");
        if let Some(event) = inner.active_events.get_mut(event_id) {
            event.db_id = Some(db_id);
        }
    }

    /// Find an active event's string id by its durable row id.
    pub fn find_by_db_id(&self, db_id: Uuid) -> Option<String> {
        let inner = self.inner.lock().expect("safety monitor lock poisoned");
        inner
            .active_events
            .values()
            .find(|event| event.db_id == Some(db_id))
            .map(|event| event.id.clone())
    }

    fn resolve_key(inner: &MonitorInner, id: &str) -> Option<String> {
        if inner.active_events.contains_key(id) {
            return Some(id.to_string());
        }
        // Fall back to durable-id lookup
        let db_id = Uuid::parse_str(id).ok()?;
        inner
            .active_events
            .values()
            .find(|event| event.db_id == Some(db_id))
            .map(|event| event.id.clone())
    }

    /// Tag an event as acknowledged. Accepts the stable string id or the
    /// durable row id; the event keeps refreshing while tagged.
    pub fn acknowledge(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");
        let Some(key) = Self::resolve_key(&inner, id) else {
            return false;
        };
        if let Some(event) = inner.active_events.get_mut(&key) {
            event.acknowledged = true;
            return true;
        }
        false
    }

    pub fn unacknowledge(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");
        let Some(key) = Self::resolve_key(&inner, id) else {
            return false;
        };
        if let Some(event) = inner.active_events.get_mut(&key) {
            event.acknowledged = false;
            return true;
        }
        false
    }

    /// Remove an event entirely.
    pub fn clear(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");
        let Some(key) = Self::resolve_key(&inner, id) else {
            return false;
        };
        inner.active_events.remove(&key).is_some()
    }

    pub fn clear_all(&self) {
        let mut inner = self.inner.lock().expect("safety monitor lock poisoned");
        inner.active_events.clear();
    }

    /// All active events, optionally filtering out acknowledged ones.
    pub fn active_events(&self, include_acknowledged: bool) -> Vec<SafetyEvent> {
        let inner = self.inner.lock().expect("safety monitor lock poisoned");
        let mut events: Vec<SafetyEvent> = inner
            .active_events
            .values()
            .filter(|event| include_acknowledged || !event.acknowledged)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        events
    }

    pub fn stats(&self) -> SafetyStats {
        let inner = self.inner.lock().expect("safety monitor lock poisoned");
        let mut stats = SafetyStats {
            tracked_aircraft: inner.aircraft_state.len(),
            active_cooldowns: inner.cooldowns.len(),
            monitoring_enabled: self.enabled(),
            active_events: inner.active_events.len(),
            acknowledged_events: 0,
            critical: 0,
            warning: 0,
            low: 0,
        };
        for event in inner.active_events.values() {
            if event.acknowledged {
                stats.acknowledged_events += 1;
            }
            match event.severity {
                Severity::Critical => stats.critical += 1,
                Severity::Warning => stats.warning += 1,
                Severity::Low => stats.low += 1,
            }
        }
        stats
    }
}
