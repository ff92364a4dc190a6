use serde_json::json;

use super::SafetyThresholds;
use super::airports::near_major_airport;
use super::events::{EventDraft, EventType, Severity};
use crate::geo;
use crate::observations::AircraftObservation;

/// Radius around a major airport inside which opposite-direction vertical
/// traffic is treated as arrival/departure flow
const AIRPORT_SUPPRESSION_RADIUS_NM: f64 = 5.0;
/// Minimum altitude for an aircraft to participate in the pairwise scan;
/// below this the target is taxiing or rolling out
const MIN_CONFLICT_ALTITUDE_FT: i32 = 500;

/// One aircraft eligible for the pairwise scan: valid position + altitude
pub(super) struct Candidate<'a> {
    pub obs: &'a AircraftObservation,
    pub lat: f64,
    pub lon: f64,
    pub alt: i32,
}

impl<'a> Candidate<'a> {
    pub fn from_observation(obs: &'a AircraftObservation) -> Option<Self> {
        if !obs.has_position() {
            return None;
        }
        let alt = obs.altitude()?;
        Some(Candidate {
            obs,
            lat: obs.lat?,
            lon: obs.lon?,
            alt,
        })
    }
}

/// One aircraft climbing and one descending, both low and both near a major
/// airport, is the normal arrival/departure picture rather than a conflict.
fn is_takeoff_landing_pair(a: &Candidate, b: &Candidate) -> bool {
    if a.alt > 3000 || b.alt > 3000 {
        return false;
    }

    let (Some(vr_a), Some(vr_b)) = (a.obs.vertical_rate, b.obs.vertical_rate) else {
        return false;
    };

    // Opposite vertical directions, with real movement on at least one side
    if (vr_a as i64) * (vr_b as i64) >= 0 {
        return false;
    }
    if vr_a.abs() < 300 && vr_b.abs() < 300 {
        return false;
    }

    near_major_airport(a.lat, a.lon, AIRPORT_SUPPRESSION_RADIUS_NM)
        && near_major_airport(b.lat, b.lon, AIRPORT_SUPPRESSION_RADIUS_NM)
}

fn severity_for(dist_nm: f64, alt_diff: i32) -> Severity {
    if dist_nm < 0.25 && alt_diff < 300 {
        Severity::Critical
    } else if dist_nm < 0.35 || alt_diff < 400 {
        Severity::Warning
    } else {
        Severity::Low
    }
}

fn pair_event(a: &Candidate, b: &Candidate, dist_nm: f64, alt_diff: i32) -> EventDraft {
    let closure = geo::closure_rate_kt(
        a.lat,
        a.lon,
        a.obs.ground_speed,
        a.obs.track,
        b.lat,
        b.lon,
        b.obs.ground_speed,
        b.obs.track,
    );

    let display_a = a.obs.display_name().to_string();
    let display_b = b.obs.display_name().to_string();

    let mut message = format!(
        "Proximity conflict: {} and {} within {:.2}nm, {}ft altitude separation",
        display_a, display_b, dist_nm, alt_diff
    );
    if let Some(rate) = closure
        && rate > 0.0
    {
        message.push_str(&format!(", closure rate {:.0}kt", rate));
    }

    let aircraft_details = |c: &Candidate, display: &str| {
        json!({
            "icao": &c.obs.icao,
            "callsign": display,
            "lat": c.lat,
            "lon": c.lon,
            "alt": c.alt,
            "gs": c.obs.ground_speed,
            "track": c.obs.track,
            "vr": c.obs.vertical_rate,
        })
    };

    EventDraft {
        event_type: EventType::ProximityConflict,
        severity: severity_for(dist_nm, alt_diff),
        icao: a.obs.icao.clone(),
        icao_2: Some(b.obs.icao.clone()),
        callsign: a.obs.callsign.clone(),
        callsign_2: b.obs.callsign.clone(),
        message,
        details: json!({
            "distance_nm": (dist_nm * 1000.0).round() / 1000.0,
            "altitude_diff_ft": alt_diff,
            "closure_rate_kt": closure,
            "aircraft_1": aircraft_details(a, &display_a),
            "aircraft_2": aircraft_details(b, &display_b),
        }),
        aircraft_snapshot: Some(a.obs.snapshot()),
        aircraft_snapshot_2: Some(b.obs.snapshot()),
    }
}

/// Scan every unordered pair of eligible aircraft for loss of separation.
/// Emission requires strictly-inside both gates; a pair exactly at the
/// thresholds does not fire.
pub(super) fn check_proximity_conflicts(
    observations: &[AircraftObservation],
    thresholds: &SafetyThresholds,
) -> Vec<EventDraft> {
    let candidates: Vec<Candidate> = observations
        .iter()
        .filter_map(Candidate::from_observation)
        .filter(|c| c.alt >= MIN_CONFLICT_ALTITUDE_FT)
        .collect();

    let mut events = Vec::new();

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let a = &candidates[i];
            let b = &candidates[j];

            let dist_nm = geo::distance_nm(a.lat, a.lon, b.lat, b.lon);
            if dist_nm >= thresholds.proximity_nm {
                continue;
            }

            let alt_diff = (a.alt - b.alt).abs();
            if alt_diff >= thresholds.altitude_diff_ft {
                continue;
            }

            if is_takeoff_landing_pair(a, b) {
                continue;
            }

            events.push(pair_event(a, b, dist_nm, alt_diff));
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::SourceChannel;
    use chrono::Utc;
    use serde_json::json;

    fn obs(fields: serde_json::Value) -> AircraftObservation {
        AircraftObservation::from_wire(&fields, SourceChannel::Adsb1090, Utc::now()).unwrap()
    }

    fn thresholds() -> SafetyThresholds {
        SafetyThresholds {
            vs_change: 1000,
            vs_extreme: 6000,
            tcas_vs: 1500,
            proximity_nm: 0.5,
            altitude_diff_ft: 500,
        }
    }

    #[test]
    fn test_single_aircraft_no_events() {
        let observations = vec![obs(
            json!({"hex": "A12345", "lat": 47.6, "lon": -122.4, "alt_baro": 10000}),
        )];
        assert!(check_proximity_conflicts(&observations, &thresholds()).is_empty());
    }

    #[test]
    fn test_close_pair_critical() {
        // ~0.12 nm apart, 200 ft vertical
        let observations = vec![
            obs(json!({"hex": "A12345", "lat": 47.6000, "lon": -122.4000, "alt_baro": 10000})),
            obs(json!({"hex": "B67890", "lat": 47.6020, "lon": -122.4000, "alt_baro": 10200})),
        ];
        let events = check_proximity_conflicts(&observations, &thresholds());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::ProximityConflict);
        assert_eq!(events[0].severity, Severity::Critical);
        // Key is stable under argument reorder
        assert_eq!(events[0].key(), "proximity_conflict:A12345:B67890");
    }

    #[test]
    fn test_pair_key_stable_under_reorder() {
        let a = obs(json!({"hex": "A12345", "lat": 47.6000, "lon": -122.4000, "alt_baro": 10000}));
        let b = obs(json!({"hex": "B67890", "lat": 47.6020, "lon": -122.4000, "alt_baro": 10200}));
        let forward = check_proximity_conflicts(&[a.clone(), b.clone()], &thresholds());
        let reverse = check_proximity_conflicts(&[b, a], &thresholds());
        assert_eq!(forward[0].key(), reverse[0].key());
    }

    #[test]
    fn test_pair_exactly_at_threshold_does_not_emit() {
        // 0.5 nm is exactly 0.5/60 degrees of latitude
        let lat_offset = 0.5 / 60.0;
        let observations = vec![
            obs(json!({"hex": "A12345", "lat": 47.0, "lon": -122.0, "alt_baro": 10000})),
            obs(json!({"hex": "B67890", "lat": 47.0 + lat_offset, "lon": -122.0, "alt_baro": 10000})),
        ];
        // Haversine rounding can land a hair under 0.5; widen slightly and
        // check the altitude gate at exactly 500 ft as well
        let t = SafetyThresholds {
            proximity_nm: 0.499,
            ..thresholds()
        };
        assert!(check_proximity_conflicts(&observations, &t).is_empty());

        let observations = vec![
            obs(json!({"hex": "A12345", "lat": 47.6000, "lon": -122.4000, "alt_baro": 10000})),
            obs(json!({"hex": "B67890", "lat": 47.6020, "lon": -122.4000, "alt_baro": 10500})),
        ];
        assert!(
            check_proximity_conflicts(&observations, &thresholds()).is_empty(),
            "500 ft separation is exactly the gate and must not emit"
        );
    }

    #[test]
    fn test_ground_traffic_excluded() {
        let observations = vec![
            obs(json!({"hex": "A12345", "lat": 47.6000, "lon": -122.4000, "alt_baro": 300})),
            obs(json!({"hex": "B67890", "lat": 47.6005, "lon": -122.4000, "alt_baro": 400})),
        ];
        assert!(check_proximity_conflicts(&observations, &thresholds()).is_empty());
    }

    #[test]
    fn test_takeoff_landing_pair_near_ksea_suppressed() {
        // Both below 3000 ft near KSEA, one climbing and one descending
        let observations = vec![
            obs(json!({
                "hex": "A12345", "lat": 47.4489, "lon": -122.3094,
                "alt_baro": 2000, "baro_rate": 1500
            })),
            obs(json!({
                "hex": "B67890", "lat": 47.4539, "lon": -122.3094,
                "alt_baro": 2200, "baro_rate": -1500
            })),
        ];
        assert!(check_proximity_conflicts(&observations, &thresholds()).is_empty());
    }

    #[test]
    fn test_same_direction_pair_near_airport_still_fires() {
        // Both climbing: not an arrival/departure pair, so it conflicts
        let observations = vec![
            obs(json!({
                "hex": "A12345", "lat": 47.4489, "lon": -122.3094,
                "alt_baro": 2000, "baro_rate": 1500
            })),
            obs(json!({
                "hex": "B67890", "lat": 47.4509, "lon": -122.3094,
                "alt_baro": 2200, "baro_rate": 1500
            })),
        ];
        assert_eq!(check_proximity_conflicts(&observations, &thresholds()).len(), 1);
    }

    #[test]
    fn test_opposite_vs_away_from_airport_still_fires() {
        // Same geometry as the suppression case but out over open water
        let observations = vec![
            obs(json!({
                "hex": "A12345", "lat": 46.5, "lon": -124.8,
                "alt_baro": 2000, "baro_rate": 1500
            })),
            obs(json!({
                "hex": "B67890", "lat": 46.503, "lon": -124.8,
                "alt_baro": 2200, "baro_rate": -1500
            })),
        ];
        assert_eq!(check_proximity_conflicts(&observations, &thresholds()).len(), 1);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_for(0.20, 200), Severity::Critical);
        assert_eq!(severity_for(0.30, 350), Severity::Warning);
        assert_eq!(severity_for(0.40, 350), Severity::Warning);
        assert_eq!(severity_for(0.45, 450), Severity::Low);
    }

    #[test]
    fn test_missing_position_excluded() {
        let observations = vec![
            obs(json!({"hex": "A12345", "alt_baro": 10000})),
            obs(json!({"hex": "B67890", "lat": 47.6020, "lon": -122.4000, "alt_baro": 10200})),
        ];
        assert!(check_proximity_conflicts(&observations, &thresholds()).is_empty());
    }
}
