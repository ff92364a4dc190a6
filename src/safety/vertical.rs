use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use super::SafetyThresholds;
use super::events::{EventDraft, EventType, Severity};
use crate::observations::AircraftObservation;

/// Emergency transponder codes. 7500 hijack, 7600 radio failure, 7700
/// general emergency.
pub fn check_emergency_squawk(obs: &AircraftObservation) -> Option<EventDraft> {
    let squawk = obs.squawk.as_deref()?;
    let (event_type, label, severity) = match squawk {
        "7500" => (EventType::SquawkHijack, "HIJACK", Severity::Critical),
        "7600" => (
            EventType::SquawkRadioFailure,
            "RADIO FAILURE",
            Severity::Warning,
        ),
        "7700" => (EventType::SquawkEmergency, "EMERGENCY", Severity::Critical),
        _ => return None,
    };

    let display = obs.display_name().to_string();
    Some(EventDraft {
        event_type,
        severity,
        icao: obs.icao.clone(),
        icao_2: None,
        callsign: obs.callsign.clone(),
        callsign_2: None,
        message: format!("{}: {} squawking {}", label, display, squawk),
        details: json!({
            "squawk": squawk,
            "altitude": obs.altitude(),
            "lat": obs.lat,
            "lon": obs.lon,
            "gs": obs.ground_speed,
            "track": obs.track,
            "vr": obs.vertical_rate,
        }),
        aircraft_snapshot: Some(obs.snapshot()),
        aircraft_snapshot_2: None,
    })
}

/// Vertical rate beyond the extreme threshold (default 6000 fpm, already far
/// outside normal operations).
pub fn check_extreme_vs(
    obs: &AircraftObservation,
    thresholds: &SafetyThresholds,
) -> Option<EventDraft> {
    let vr = obs.vertical_rate?;
    let abs_vs = vr.abs();
    if abs_vs < thresholds.vs_extreme {
        return None;
    }

    let severity = if abs_vs >= 8000 {
        Severity::Critical
    } else if abs_vs >= 7000 {
        Severity::Warning
    } else {
        Severity::Low
    };
    let direction = if vr > 0 { "climbing" } else { "descending" };
    let display = obs.display_name().to_string();

    Some(EventDraft {
        event_type: EventType::ExtremeVs,
        severity,
        icao: obs.icao.clone(),
        icao_2: None,
        callsign: obs.callsign.clone(),
        callsign_2: None,
        message: format!(
            "Extreme vertical speed: {} {} at {} fpm",
            display, direction, abs_vs
        ),
        details: json!({
            "vertical_rate": vr,
            "altitude": obs.altitude(),
            "threshold": thresholds.vs_extreme,
            "lat": obs.lat,
            "lon": obs.lon,
            "gs": obs.ground_speed,
            "squawk": &obs.squawk,
        }),
        aircraft_snapshot: Some(obs.snapshot()),
        aircraft_snapshot_2: None,
    })
}

/// How far back to look for the comparison sample
const REVERSAL_LOOKBACK_SECS: i64 = 4;

/// Find the vertical-rate sample from roughly `REVERSAL_LOOKBACK_SECS` ago:
/// the newest sample at least that old. When every retained sample is more
/// recent, the second-newest stands in so a fast-updating aircraft still
/// gets a usable reference.
fn reference_vs(history: &[(DateTime<Utc>, i32)], now: DateTime<Utc>) -> Option<i32> {
    let target = now - Duration::seconds(REVERSAL_LOOKBACK_SECS);
    history
        .iter()
        .rev()
        .find(|(t, _)| *t <= target)
        .map(|(_, v)| *v)
        .or_else(|| {
            if history.len() >= 2 {
                Some(history[history.len() - 2].1)
            } else {
                None
            }
        })
}

/// Vertical-rate reversal detection. A true sign change between the current
/// rate and the rate ~4 s earlier is either a suspected TCAS RA (both
/// magnitudes beyond the TCAS threshold) or a plain reversal when the swing
/// is large enough. Low-altitude climbs are ignored: brief negative rates
/// during rotation would otherwise fire on every departure.
///
/// Emits at most one event per detection.
pub fn check_vs_reversal(
    obs: &AircraftObservation,
    vs_history: &[(DateTime<Utc>, i32)],
    thresholds: &SafetyThresholds,
    now: DateTime<Utc>,
) -> Option<EventDraft> {
    let current_vs = obs.vertical_rate?;
    let prev_vs = reference_vs(vs_history, now)?;

    // Strict sign change: a zero previous rate can never reverse
    if (prev_vs as i64) * (current_vs as i64) >= 0 {
        return None;
    }

    let altitude = obs.altitude();
    let is_takeoff = altitude.is_some_and(|alt| alt < 3000) && current_vs > 0;
    if is_takeoff {
        return None;
    }

    let display = obs.display_name().to_string();
    let abs_change = (current_vs - prev_vs).abs();

    let is_tcas_ra =
        prev_vs.abs() >= thresholds.tcas_vs && current_vs.abs() >= thresholds.tcas_vs;

    let (event_type, severity, message, threshold) = if is_tcas_ra {
        (
            EventType::TcasRa,
            Severity::Critical,
            format!(
                "TCAS RA suspected: {} VS reversed from {:+} to {:+} fpm",
                display, prev_vs, current_vs
            ),
            thresholds.tcas_vs,
        )
    } else if abs_change >= thresholds.vs_change {
        let severity = if abs_change >= 4000 {
            Severity::Warning
        } else {
            Severity::Low
        };
        (
            EventType::VsReversal,
            severity,
            format!(
                "VS reversal: {} {:+} -> {:+} fpm",
                display, prev_vs, current_vs
            ),
            thresholds.vs_change,
        )
    } else {
        return None;
    };

    Some(EventDraft {
        event_type,
        severity,
        icao: obs.icao.clone(),
        icao_2: None,
        callsign: obs.callsign.clone(),
        callsign_2: None,
        message,
        details: json!({
            "previous_vs": prev_vs,
            "current_vs": current_vs,
            "vs_change": current_vs - prev_vs,
            "altitude": altitude,
            "lat": obs.lat,
            "lon": obs.lon,
            "gs": obs.ground_speed,
            "squawk": &obs.squawk,
            "threshold": threshold,
        }),
        aircraft_snapshot: Some(obs.snapshot()),
        aircraft_snapshot_2: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::SourceChannel;
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

    fn history(now: DateTime<Utc>, samples: &[(i64, i32)]) -> Vec<(DateTime<Utc>, i32)> {
        samples
            .iter()
            .map(|(secs_ago, vs)| (now - Duration::seconds(*secs_ago), *vs))
            .collect()
    }

    #[test]
    fn test_emergency_squawk_types() {
        let draft = check_emergency_squawk(&obs(json!({"hex": "A12345", "squawk": "7700"})))
            .expect("7700 should fire");
        assert_eq!(draft.event_type, EventType::SquawkEmergency);
        assert_eq!(draft.severity, Severity::Critical);

        let draft = check_emergency_squawk(&obs(json!({"hex": "A12345", "squawk": "7600"})))
            .expect("7600 should fire");
        assert_eq!(draft.event_type, EventType::SquawkRadioFailure);
        assert_eq!(draft.severity, Severity::Warning);

        let draft = check_emergency_squawk(&obs(json!({"hex": "A12345", "squawk": "7500"})))
            .expect("7500 should fire");
        assert_eq!(draft.event_type, EventType::SquawkHijack);
        assert_eq!(draft.severity, Severity::Critical);

        assert!(check_emergency_squawk(&obs(json!({"hex": "A12345", "squawk": "1200"}))).is_none());
        assert!(check_emergency_squawk(&obs(json!({"hex": "A12345"}))).is_none());
    }

    #[test]
    fn test_extreme_vs_severity_bands() {
        let t = thresholds();
        assert!(check_extreme_vs(&obs(json!({"hex": "A", "baro_rate": 5999})), &t).is_none());

        let draft = check_extreme_vs(&obs(json!({"hex": "A", "baro_rate": 6200})), &t).unwrap();
        assert_eq!(draft.severity, Severity::Low);

        let draft = check_extreme_vs(&obs(json!({"hex": "A", "baro_rate": -7200})), &t).unwrap();
        assert_eq!(draft.severity, Severity::Warning);

        let draft = check_extreme_vs(&obs(json!({"hex": "A", "baro_rate": 8500})), &t).unwrap();
        assert_eq!(draft.severity, Severity::Critical);
    }

    #[test]
    fn test_tcas_ra_on_strong_reversal() {
        let now = Utc::now();
        let hist = history(now, &[(8, -2000), (4, -2000)]);
        let draft = check_vs_reversal(
            &obs(json!({"hex": "A12345", "baro_rate": 2000, "alt_baro": 15000})),
            &hist,
            &thresholds(),
            now,
        )
        .expect("reversal should fire");
        assert_eq!(draft.event_type, EventType::TcasRa);
        assert_eq!(draft.severity, Severity::Critical);
    }

    #[test]
    fn test_no_reversal_without_sign_change() {
        let now = Utc::now();
        // Magnitude change only, same sign
        let hist = history(now, &[(8, 500), (4, 500)]);
        assert!(
            check_vs_reversal(
                &obs(json!({"hex": "A", "baro_rate": 3000, "alt_baro": 10000})),
                &hist,
                &thresholds(),
                now
            )
            .is_none()
        );
    }

    #[test]
    fn test_zero_previous_vs_never_fires() {
        let now = Utc::now();
        let hist = history(now, &[(8, 0), (4, 0)]);
        assert!(
            check_vs_reversal(
                &obs(json!({"hex": "A", "baro_rate": 2500, "alt_baro": 10000})),
                &hist,
                &thresholds(),
                now
            )
            .is_none()
        );
    }

    #[test]
    fn test_takeoff_rotation_suppressed() {
        let now = Utc::now();
        let hist = history(now, &[(8, -1600), (4, -1600)]);
        // Below 3000 ft and climbing: normal rotation, not a TCAS RA
        assert!(
            check_vs_reversal(
                &obs(json!({"hex": "A", "baro_rate": 1800, "alt_baro": 1500})),
                &hist,
                &thresholds(),
                now
            )
            .is_none()
        );
        // Same rates at altitude do fire
        assert!(
            check_vs_reversal(
                &obs(json!({"hex": "A", "baro_rate": 1800, "alt_baro": 9000})),
                &hist,
                &thresholds(),
                now
            )
            .is_some()
        );
    }

    #[test]
    fn test_descending_reversal_at_low_altitude_not_suppressed() {
        let now = Utc::now();
        let hist = history(now, &[(8, 1600), (4, 1600)]);
        // Low altitude but descending: suppression only covers climbs
        let draft = check_vs_reversal(
            &obs(json!({"hex": "A", "baro_rate": -1800, "alt_baro": 1500})),
            &hist,
            &thresholds(),
            now,
        );
        assert!(draft.is_some());
    }

    #[test]
    fn test_mild_reversal_below_change_threshold_ignored() {
        let now = Utc::now();
        let hist = history(now, &[(8, -400), (4, -400)]);
        // Sign change but only a 900 fpm swing
        assert!(
            check_vs_reversal(
                &obs(json!({"hex": "A", "baro_rate": 500, "alt_baro": 10000})),
                &hist,
                &thresholds(),
                now
            )
            .is_none()
        );
    }

    #[test]
    fn test_vs_reversal_severity_by_swing() {
        let now = Utc::now();
        let hist = history(now, &[(8, -1200), (4, -1200)]);
        // 1200 -> +900: swing 2100, below TCAS magnitudes on one side
        let draft = check_vs_reversal(
            &obs(json!({"hex": "A", "baro_rate": 900, "alt_baro": 10000})),
            &hist,
            &thresholds(),
            now,
        )
        .unwrap();
        assert_eq!(draft.event_type, EventType::VsReversal);
        assert_eq!(draft.severity, Severity::Low);

        let hist = history(now, &[(8, -3200), (4, -3200)]);
        let draft = check_vs_reversal(
            &obs(json!({"hex": "A", "baro_rate": 900, "alt_baro": 10000})),
            &hist,
            &thresholds(),
            now,
        )
        .unwrap();
        assert_eq!(draft.severity, Severity::Warning);
    }

    #[test]
    fn test_reference_vs_prefers_lookback_sample() {
        let now = Utc::now();
        let hist = history(now, &[(10, -2000), (6, -1000), (1, 300)]);
        // The newest sample (1 s ago) is skipped; 6 s ago satisfies t <= now-4
        assert_eq!(reference_vs(&hist, now), Some(-1000));
    }

    #[test]
    fn test_reference_vs_fallback_second_newest() {
        let now = Utc::now();
        // Nothing is 4 s old yet; fall back to the second-newest sample
        let hist = history(now, &[(2, -1500), (1, 300)]);
        assert_eq!(reference_vs(&hist, now), Some(-1500));
    }

    #[test]
    fn test_reference_vs_single_old_sample_usable() {
        let now = Utc::now();
        // A lone sample exactly at the lookback horizon is a valid
        // reference: two observations four seconds apart must detect
        let hist = history(now, &[(4, -1500)]);
        assert_eq!(reference_vs(&hist, now), Some(-1500));
    }

    #[test]
    fn test_reference_vs_single_fresh_sample_unusable() {
        let now = Utc::now();
        let hist = history(now, &[(1, -1500)]);
        assert_eq!(reference_vs(&hist, now), None);
    }
}
