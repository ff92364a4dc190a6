use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Safety event classes the detectors can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Squawk 7500
    SquawkHijack,
    /// Squawk 7600
    SquawkRadioFailure,
    /// Squawk 7700
    SquawkEmergency,
    ExtremeVs,
    VsReversal,
    TcasRa,
    ProximityConflict,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SquawkHijack => "squawk_hijack",
            EventType::SquawkRadioFailure => "squawk_radio_failure",
            EventType::SquawkEmergency => "squawk_emergency",
            EventType::ExtremeVs => "extreme_vs",
            EventType::VsReversal => "vs_reversal",
            EventType::TcasRa => "tcas_ra",
            EventType::ProximityConflict => "proximity_conflict",
        }
    }

    /// Emergency squawk events persist while the squawk is set and are
    /// deduplicated purely by their stable event key.
    pub fn bypasses_cooldown(&self) -> bool {
        matches!(
            self,
            EventType::SquawkHijack | EventType::SquawkRadioFailure | EventType::SquawkEmergency
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic event identity. Pair events sort the two addresses so
/// (A, B) and (B, A) collapse onto the same key; the same keying is used
/// for cooldown entries.
pub fn event_key(event_type: EventType, icao: &str, icao_2: Option<&str>) -> String {
    match icao_2 {
        Some(other) => {
            let (a, b) = if icao <= other {
                (icao, other)
            } else {
                (other, icao)
            };
            format!("{}:{}:{}", event_type, a, b)
        }
        None => format!("{}:{}", event_type, icao),
    }
}

/// A detector's output before it enters the event table
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub event_type: EventType,
    pub severity: Severity,
    pub icao: String,
    pub icao_2: Option<String>,
    pub callsign: Option<String>,
    pub callsign_2: Option<String>,
    pub message: String,
    pub details: Value,
    pub aircraft_snapshot: Option<Value>,
    pub aircraft_snapshot_2: Option<Value>,
}

impl EventDraft {
    pub fn key(&self) -> String {
        event_key(self.event_type, &self.icao, self.icao_2.as_deref())
    }
}

/// A live safety event. Created when a detector first fires, refreshed
/// (payload merged, `last_seen` bumped) while the condition persists, and
/// expired when not refreshed for the retention window. Acknowledgment is a
/// non-destructive overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Stable string identity, e.g. `proximity_conflict:A12345:B67890`
    pub id: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub icao: String,
    pub icao_2: Option<String>,
    pub callsign: Option<String>,
    pub callsign_2: Option<String>,
    pub message: String,
    pub details: Value,
    pub aircraft_snapshot: Option<Value>,
    pub aircraft_snapshot_2: Option<Value>,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Durable row id, glued on once the event has been stored
    pub db_id: Option<Uuid>,
}

impl SafetyEvent {
    pub fn from_draft(draft: EventDraft, now: DateTime<Utc>) -> Self {
        let id = draft.key();
        SafetyEvent {
            id,
            event_type: draft.event_type,
            severity: draft.severity,
            icao: draft.icao,
            icao_2: draft.icao_2,
            callsign: draft.callsign,
            callsign_2: draft.callsign_2,
            message: draft.message,
            details: draft.details,
            aircraft_snapshot: draft.aircraft_snapshot,
            aircraft_snapshot_2: draft.aircraft_snapshot_2,
            acknowledged: false,
            created_at: now,
            last_seen: now,
            db_id: None,
        }
    }

    /// Merge a fresh detection into this event, keeping identity, creation
    /// time, durable id, and acknowledgment.
    pub fn refresh(&mut self, draft: EventDraft, now: DateTime<Utc>) {
        self.severity = draft.severity;
        self.callsign = draft.callsign;
        self.callsign_2 = draft.callsign_2;
        self.message = draft.message;
        self.details = draft.details;
        self.aircraft_snapshot = draft.aircraft_snapshot;
        self.aircraft_snapshot_2 = draft.aircraft_snapshot_2;
        self.last_seen = now;
    }
}
