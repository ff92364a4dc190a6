//! User-defined alert rule evaluation.
//!
//! Rules are read-mostly: the engine compiles them into a snapshot published
//! by atomic pointer swap, so the per-aircraft hot path never takes a lock.
//! Any rule CRUD marks the snapshot stale; the next evaluation cycle rebuilds
//! it from storage.

pub mod eval;
pub mod rules;

pub use rules::{AlertRule, CompiledRule};

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::observations::AircraftObservation;

/// One rule firing against one aircraft. The pipeline turns this into an
/// AlertHistory row, a fan-out publish, an optional webhook POST, and an
/// optional notification.
#[derive(Debug, Clone)]
pub struct AlertFire {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub priority: String,
    pub api_url: Option<String>,
    pub icao: String,
    pub callsign: Option<String>,
    pub message: String,
    pub aircraft_data: serde_json::Value,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Default)]
struct RuleSnapshot {
    rules: Vec<CompiledRule>,
}

pub struct AlertEngine {
    snapshot: ArcSwap<RuleSnapshot>,
    stale: AtomicBool,
    /// (rule id, ICAO) -> last fire time
    cooldowns: DashMap<(Uuid, String), DateTime<Utc>>,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertEngine {
    pub fn new() -> Self {
        AlertEngine {
            snapshot: ArcSwap::from_pointee(RuleSnapshot::default()),
            stale: AtomicBool::new(true),
            cooldowns: DashMap::new(),
        }
    }

    /// Mark the compiled snapshot stale. Called on any rule CRUD.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Compile and publish a fresh snapshot. Rules that fail to compile are
    /// skipped with a warning rather than poisoning the rest.
    pub fn install_rules(&self, rules: &[AlertRule]) {
        let compiled: Vec<CompiledRule> = rules
            .iter()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| match CompiledRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("Skipping uncompilable alert rule '{}': {}", rule.name, e);
                    None
                }
            })
            .collect();
        debug!("Installed alert rule snapshot ({} rules)", compiled.len());
        metrics::gauge!("alerts.compiled_rules").set(compiled.len() as f64);
        self.snapshot.store(Arc::new(RuleSnapshot { rules: compiled }));
        self.stale.store(false, Ordering::Release);
    }

    /// Drop cooldown entries for a deleted rule so a recreated rule with the
    /// same aircraft in view starts clean.
    pub fn clear_cooldowns_for_rule(&self, rule_id: Uuid) {
        self.cooldowns.retain(|(rid, _), _| *rid != rule_id);
    }

    /// Evaluate every active rule against one aircraft.
    pub fn check_aircraft(
        &self,
        obs: &AircraftObservation,
        distance_nm: Option<f64>,
    ) -> Vec<AlertFire> {
        self.check_aircraft_at(obs, distance_nm, Utc::now())
    }

    /// Clock-injected variant of [`check_aircraft`](Self::check_aircraft).
    pub fn check_aircraft_at(
        &self,
        obs: &AircraftObservation,
        distance_nm: Option<f64>,
        now: DateTime<Utc>,
    ) -> Vec<AlertFire> {
        let snapshot = self.snapshot.load();
        let mut fires = Vec::new();

        for rule in &snapshot.rules {
            if !rule.is_active(now) {
                continue;
            }
            if !eval::rule_matches(rule, obs, distance_nm) {
                continue;
            }

            let cooldown_key = (rule.id, obs.icao.clone());
            if let Some(last) = self.cooldowns.get(&cooldown_key)
                && now.signed_duration_since(*last) < Duration::seconds(rule.cooldown_seconds)
            {
                continue;
            }
            self.cooldowns.insert(cooldown_key, now);

            let display = obs.display_name().to_string();
            fires.push(AlertFire {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                priority: rule.priority.clone(),
                api_url: rule.api_url.clone(),
                icao: obs.icao.clone(),
                callsign: obs.callsign.clone(),
                message: format!("Alert '{}' matched {} ({})", rule.name, display, obs.icao),
                aircraft_data: json!({
                    "hex": &obs.icao,
                    "flight": &obs.callsign,
                    "alt": obs.altitude_baro,
                    "lat": obs.lat,
                    "lon": obs.lon,
                    "gs": obs.ground_speed,
                    "track": obs.track,
                    "military": obs.is_military,
                    "distance_nm": distance_nm.map(|d| (d * 100.0).round() / 100.0),
                }),
                triggered_at: now,
            });
            metrics::counter!("alerts.fired_total").increment(1);
        }

        fires
    }

    /// Sweep cooldown entries older than the longest plausible cooldown so
    /// the map does not grow unboundedly with one-off traffic.
    pub fn sweep_cooldowns(&self, max_age: Duration) {
        let cutoff = Utc::now() - max_age;
        self.cooldowns.retain(|_, last| *last > cutoff);
    }
}
