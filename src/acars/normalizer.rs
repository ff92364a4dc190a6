//! Normalization of ACARS and VDL2 wire JSON into the common message shape.
//!
//! Three shapes arrive on the wire: flat `acarsdec` JSON, flat VDL2 JSON,
//! and deeply nested `dumpvdl2` JSON whose payload sits at
//! `vdl2.avlc.acars`. The permissive map is narrowed here, once; nothing
//! downstream sees the raw shape.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aviation VHF band sanity bounds, MHz
const FREQ_MIN_MHZ: f64 = 100.0;
const FREQ_MAX_MHZ: f64 = 200.0;

/// The source-agnostic message record. Identical content yields an identical
/// record whether it arrived as flat ACARS or nested VDL2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcarsMessage {
    /// "acars" or "vdlm2"
    pub source: String,
    /// Seconds since epoch with sub-second precision
    pub timestamp: f64,
    pub frequency: Option<f64>,
    pub channel: Option<String>,
    pub icao_hex: Option<String>,
    pub registration: Option<String>,
    pub callsign: Option<String>,
    pub label: Option<String>,
    pub block_id: Option<String>,
    pub msg_num: Option<String>,
    pub ack: Option<String>,
    pub mode: Option<String>,
    pub text: Option<String>,
    pub signal_level: Option<f64>,
    pub error_count: Option<i32>,
    pub station_id: Option<String>,
    /// Enrichment output: airline, label info, decoded text analysis
    pub decoded: Option<Value>,
}

fn str_or_none(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// ICAO addresses arrive as hex strings or as raw integers; both normalize
/// to 6 uppercase hex characters.
fn icao_from(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_uppercase()),
        Some(Value::Number(n)) => n.as_u64().map(|addr| format!("{:06X}", addr)),
        _ => None,
    }
}

/// Registrations carry leading/embedded dots on the wire (`.N123AB`,
/// `N.789.AB`); strip them all.
fn registration_from(value: Option<&Value>) -> Option<String> {
    str_or_none(value).map(|tail| tail.replace('.', "")).filter(|r| !r.is_empty())
}

/// Hz values are divided down to MHz, then bounds-checked against the
/// aviation band; out-of-band values are dropped rather than stored wrong.
fn normalize_frequency(value: Option<&Value>) -> Option<f64> {
    let raw = value?.as_f64()?;
    let mhz = if raw > 1000.0 { raw / 1_000_000.0 } else { raw };
    if (FREQ_MIN_MHZ..=FREQ_MAX_MHZ).contains(&mhz) {
        Some(mhz)
    } else {
        None
    }
}

fn timestamp_from(raw: &Value) -> f64 {
    raw.get("timestamp")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| Utc::now().timestamp_millis() as f64 / 1000.0)
}

/// Normalize one wire message. Returns None for unknown sources and for
/// nested VDL2 frames without an ACARS payload.
pub fn normalize_message(raw: &Value, source: &str) -> Option<AcarsMessage> {
    match source {
        "acars" => Some(normalize_flat(raw, "acars")),
        "vdlm2" => {
            if raw.get("vdl2").is_some() {
                normalize_nested_vdl2(raw)
            } else {
                Some(normalize_flat(raw, "vdlm2"))
            }
        }
        _ => None,
    }
}

/// Flat `acarsdec`-style JSON, shared by ACARS and flat VDL2 feeds.
fn normalize_flat(raw: &Value, source: &str) -> AcarsMessage {
    let station_id = str_or_none(raw.get("station_id"))
        .or_else(|| str_or_none(raw.get("app").and_then(|app| app.get("name"))));

    AcarsMessage {
        source: source.to_string(),
        timestamp: timestamp_from(raw),
        frequency: normalize_frequency(raw.get("freq")),
        channel: str_or_none(raw.get("channel")),
        icao_hex: icao_from(
            raw.get("icao")
                .or_else(|| raw.get("hex"))
                .or_else(|| raw.get("icao_hex")),
        ),
        registration: registration_from(raw.get("tail")),
        callsign: str_or_none(raw.get("flight")),
        label: str_or_none(raw.get("label")),
        block_id: str_or_none(raw.get("block_id").or_else(|| raw.get("blk_id"))),
        msg_num: str_or_none(raw.get("msgno").or_else(|| raw.get("msg_num"))),
        ack: str_or_none(raw.get("ack")),
        mode: str_or_none(raw.get("mode")),
        text: str_or_none(raw.get("text")),
        signal_level: raw.get("level").and_then(Value::as_f64),
        error_count: raw.get("error").and_then(Value::as_i64).map(|e| e as i32),
        station_id,
        decoded: None,
    }
}

/// Nested `dumpvdl2` JSON: the ACARS payload lives at `vdl2.avlc.acars`.
fn normalize_nested_vdl2(raw: &Value) -> Option<AcarsMessage> {
    let vdl2 = raw.get("vdl2")?;
    let avlc = vdl2.get("avlc")?;
    let acars = avlc.get("acars")?;

    let timestamp = vdl2
        .get("t")
        .map(|t| {
            let sec = t.get("sec").and_then(Value::as_f64).unwrap_or(0.0);
            let usec = t.get("usec").and_then(Value::as_f64).unwrap_or(0.0);
            sec + usec / 1_000_000.0
        })
        .filter(|t| *t > 0.0)
        .unwrap_or_else(|| timestamp_from(raw));

    Some(AcarsMessage {
        source: "vdlm2".to_string(),
        timestamp,
        frequency: normalize_frequency(vdl2.get("freq")),
        channel: str_or_none(vdl2.get("channel")),
        icao_hex: icao_from(avlc.get("src").and_then(|src| src.get("addr"))),
        registration: registration_from(acars.get("reg")),
        callsign: str_or_none(acars.get("flight")),
        label: str_or_none(acars.get("label")),
        block_id: str_or_none(acars.get("blk_id")),
        msg_num: str_or_none(acars.get("msg_num")),
        ack: str_or_none(acars.get("ack")),
        mode: str_or_none(acars.get("mode")),
        text: str_or_none(acars.get("msg_text")),
        signal_level: vdl2.get("sig_level").and_then(Value::as_f64),
        error_count: None,
        station_id: str_or_none(vdl2.get("station")).or_else(|| {
            str_or_none(raw.get("app").and_then(|app| app.get("name")))
        }),
        decoded: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_acars_basic() {
        let raw = json!({
            "timestamp": 1704067200.0,
            "freq": 131.55,
            "channel": "2",
            "icao": "ABC123",
            "tail": "N12345",
            "flight": "UAL456",
            "label": "10",
            "text": "Test message",
            "level": -5.2,
            "error": 0,
        });
        let msg = normalize_message(&raw, "acars").unwrap();
        assert_eq!(msg.source, "acars");
        assert_eq!(msg.timestamp, 1704067200.0);
        assert_eq!(msg.frequency, Some(131.55));
        assert_eq!(msg.channel.as_deref(), Some("2"));
        assert_eq!(msg.icao_hex.as_deref(), Some("ABC123"));
        assert_eq!(msg.registration.as_deref(), Some("N12345"));
        assert_eq!(msg.callsign.as_deref(), Some("UAL456"));
        assert_eq!(msg.label.as_deref(), Some("10"));
        assert_eq!(msg.text.as_deref(), Some("Test message"));
        assert_eq!(msg.signal_level, Some(-5.2));
        assert_eq!(msg.error_count, Some(0));
    }

    #[test]
    fn test_icao_uppercased_and_alternate_fields() {
        let msg = normalize_message(&json!({"icao": "abc123"}), "acars").unwrap();
        assert_eq!(msg.icao_hex.as_deref(), Some("ABC123"));

        let msg = normalize_message(&json!({"icao_hex": "ABC123"}), "acars").unwrap();
        assert_eq!(msg.icao_hex.as_deref(), Some("ABC123"));

        let msg = normalize_message(&json!({"hex": "DEF456"}), "acars").unwrap();
        assert_eq!(msg.icao_hex.as_deref(), Some("DEF456"));
    }

    #[test]
    fn test_integer_icao_rendered_as_hex() {
        let msg = normalize_message(&json!({"icao": 789012}), "vdlm2").unwrap();
        assert_eq!(msg.icao_hex.as_deref(), Some("0C0A14"));
    }

    #[test]
    fn test_station_id_from_app_name() {
        let msg = normalize_message(
            &json!({"icao": "ABC123", "app": {"name": "acarsdec-v3.7"}}),
            "acars",
        )
        .unwrap();
        assert_eq!(msg.station_id.as_deref(), Some("acarsdec-v3.7"));
    }

    #[test]
    fn test_callsign_stripped() {
        let msg =
            normalize_message(&json!({"icao": "ABC123", "flight": "  UAL456  "}), "acars").unwrap();
        assert_eq!(msg.callsign.as_deref(), Some("UAL456"));
    }

    #[test]
    fn test_empty_ack_is_none() {
        let msg = normalize_message(&json!({"icao": "ABC123", "ack": "NAK"}), "acars").unwrap();
        assert_eq!(msg.ack.as_deref(), Some("NAK"));

        let msg = normalize_message(&json!({"icao": "ABC123", "ack": ""}), "acars").unwrap();
        assert_eq!(msg.ack, None);

        let msg = normalize_message(&json!({"icao": "ABC123"}), "acars").unwrap();
        assert_eq!(msg.ack, None);
    }

    #[test]
    fn test_registration_dots_stripped() {
        let msg = normalize_message(&json!({"icao": "ABC123", "tail": "N.123.AB"}), "acars").unwrap();
        assert_eq!(msg.registration.as_deref(), Some("N123AB"));
    }

    #[test]
    fn test_vdlm2_flat() {
        let raw = json!({
            "timestamp": 1704067200.0,
            "freq": 136.975,
            "icao": 789012,
            "tail": "N.789.AB",
            "flight": "DAL789",
            "label": "H1",
            "text": "VDL2 message",
            "level": -8.5,
        });
        let msg = normalize_message(&raw, "vdlm2").unwrap();
        assert_eq!(msg.source, "vdlm2");
        assert_eq!(msg.icao_hex.as_deref(), Some("0C0A14"));
        assert_eq!(msg.registration.as_deref(), Some("N789AB"));
        assert_eq!(msg.callsign.as_deref(), Some("DAL789"));
    }

    #[test]
    fn test_vdlm2_nested_dumpvdl2() {
        let raw = json!({
            "timestamp": 1704067200.0,
            "vdl2": {
                "freq": 136.975,
                "channel": "2",
                "t": {"sec": 1704067200, "usec": 250000},
                "avlc": {
                    "src": {"addr": "ABC123"},
                    "acars": {
                        "reg": ".N123AB",
                        "flight": "AAL123",
                        "label": "21",
                        "msg_text": "Nested VDL2 message",
                        "blk_id": "A",
                        "msg_num": "M01",
                        "ack": "!",
                        "mode": "2",
                    },
                },
                "sig_level": -6.0,
            },
        });
        let msg = normalize_message(&raw, "vdlm2").unwrap();
        assert_eq!(msg.source, "vdlm2");
        assert_eq!(msg.frequency, Some(136.975));
        assert_eq!(msg.icao_hex.as_deref(), Some("ABC123"));
        assert_eq!(msg.registration.as_deref(), Some("N123AB"));
        assert_eq!(msg.callsign.as_deref(), Some("AAL123"));
        assert_eq!(msg.label.as_deref(), Some("21"));
        assert_eq!(msg.text.as_deref(), Some("Nested VDL2 message"));
        assert_eq!(msg.block_id.as_deref(), Some("A"));
        assert_eq!(msg.msg_num.as_deref(), Some("M01"));
        assert_eq!(msg.signal_level, Some(-6.0));
        assert!((msg.timestamp - 1704067200.25).abs() < 1e-6);
    }

    #[test]
    fn test_nested_vdl2_without_acars_payload_dropped() {
        let raw = json!({"vdl2": {"freq": 136.975, "avlc": {"src": {"addr": "ABC123"}}}});
        assert!(normalize_message(&raw, "vdlm2").is_none());
    }

    #[test]
    fn test_unknown_source_none() {
        assert!(normalize_message(&json!({"icao": "ABC123"}), "sbs").is_none());
    }

    #[test]
    fn test_frequency_hz_converted() {
        let msg = normalize_message(&json!({"icao": "ABC123", "freq": 136975000}), "acars").unwrap();
        assert!((msg.frequency.unwrap() - 136.975).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_mhz_unchanged() {
        let msg = normalize_message(&json!({"icao": "ABC123", "freq": 131.55}), "acars").unwrap();
        assert!((msg.frequency.unwrap() - 131.55).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_out_of_band_dropped() {
        let msg = normalize_message(&json!({"icao": "ABC123", "freq": 50.0}), "acars").unwrap();
        assert_eq!(msg.frequency, None);

        let msg = normalize_message(&json!({"icao": "ABC123", "freq": 450.0}), "acars").unwrap();
        assert_eq!(msg.frequency, None);
    }

    #[test]
    fn test_nested_frequency_hz_converted() {
        let raw = json!({
            "vdl2": {
                "freq": 136975000,
                "avlc": {"src": {"addr": "ABC123"}, "acars": {}},
            },
        });
        let msg = normalize_message(&raw, "vdlm2").unwrap();
        assert!((msg.frequency.unwrap() - 136.975).abs() < 1e-9);
    }

    #[test]
    fn test_source_agnostic_canonical_record() {
        // The same content through flat ACARS and nested VDL2 shapes yields
        // matching canonical fields
        let flat = normalize_message(
            &json!({
                "timestamp": 1704067200.0,
                "freq": 136.975,
                "icao": "ABC123",
                "tail": "N123AB",
                "flight": "AAL123",
                "label": "21",
                "text": "Same content",
            }),
            "acars",
        )
        .unwrap();
        let nested = normalize_message(
            &json!({
                "vdl2": {
                    "freq": 136.975,
                    "t": {"sec": 1704067200},
                    "avlc": {
                        "src": {"addr": "ABC123"},
                        "acars": {
                            "reg": "N.123.AB",
                            "flight": "AAL123",
                            "label": "21",
                            "msg_text": "Same content",
                        },
                    },
                },
            }),
            "vdlm2",
        )
        .unwrap();

        assert_eq!(flat.icao_hex, nested.icao_hex);
        assert_eq!(flat.registration, nested.registration);
        assert_eq!(flat.callsign, nested.callsign);
        assert_eq!(flat.label, nested.label);
        assert_eq!(flat.text, nested.text);
        assert_eq!(flat.frequency, nested.frequency);
        assert_eq!(flat.timestamp, nested.timestamp);
    }
}
