//! ACARS ingest flow: dedup idempotence, source-agnostic normalization,
//! and enrichment through the service's datagram entry point.

use serde_json::json;

use skywatch::acars::AcarsService;

fn datagram(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[test]
fn duplicate_datagrams_within_ttl_yield_one_message() {
    let service = AcarsService::new();
    let data = datagram(json!({
        "timestamp": 1704067200.0,
        "freq": 131.55,
        "icao": "A1B2C3",
        "tail": "N12345",
        "flight": "UAL456",
        "label": "10",
        "text": "OUT event report",
    }));

    let first = service.process_datagram(&data, "acars");
    let second = service.process_datagram(&data, "acars");

    assert!(first.is_some(), "first delivery passes");
    assert!(second.is_none(), "second delivery within TTL drops");

    let stats = service.get_stats();
    assert_eq!(stats["sources"]["acars"]["total"], 1);
    assert_eq!(stats["sources"]["acars"]["duplicates"], 1);
    assert_eq!(service.recent_messages(10).len(), 1);
}

#[test]
fn receiver_jitter_within_same_second_still_dedupes() {
    let service = AcarsService::new();
    let base = json!({
        "icao": "A1B2C3",
        "label": "H1",
        "text": "FPN/DA:KJFK/AA:KLAX",
    });

    let mut first = base.clone();
    first["timestamp"] = json!(1704067200.123);
    let mut second = base;
    second["timestamp"] = json!(1704067200.876);

    assert!(service.process_datagram(&datagram(first), "acars").is_some());
    assert!(service.process_datagram(&datagram(second), "acars").is_none());
}

#[test]
fn flat_and_nested_shapes_normalize_to_same_record() {
    let service = AcarsService::new();

    let flat = service
        .process_datagram(
            &datagram(json!({
                "timestamp": 1704067200.0,
                "freq": 136.975,
                "icao": "ABC123",
                "tail": "N123AB",
                "flight": "AAL123",
                "label": "21",
                "text": "Canonical content",
            })),
            "acars",
        )
        .unwrap();

    let nested = service
        .process_datagram(
            &datagram(json!({
                "vdl2": {
                    "freq": 136975000,
                    "t": {"sec": 1704067200},
                    "avlc": {
                        "src": {"addr": "abc123"},
                        "acars": {
                            "reg": ".N.123.AB",
                            "flight": "AAL123",
                            "label": "21",
                            "msg_text": "Canonical content",
                        },
                    },
                },
            })),
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

#[test]
fn enrichment_attached_to_processed_messages() {
    let service = AcarsService::new();
    let msg = service
        .process_datagram(
            &datagram(json!({
                "timestamp": 1704067200.0,
                "icao": "ABC123",
                "flight": "DAL0042",
                "label": "H1",
                "text": "FPN/DA:KSEA/AA:KATL",
            })),
            "acars",
        )
        .unwrap();

    let decoded = msg.decoded.expect("enrichment present");
    assert_eq!(decoded["airline"]["icao"], "DAL");
    assert_eq!(decoded["airline"]["name"], "Delta Air Lines");
    assert_eq!(decoded["airline"]["flight_number"], "42");
    assert_eq!(decoded["label_info"]["name"], "Datalink");
    assert_eq!(decoded["decoded"]["message_type"], "Flight Plan");
    assert_eq!(decoded["decoded"]["origin"], "KSEA");
    assert_eq!(decoded["decoded"]["destination"], "KATL");
}

#[test]
fn malformed_and_out_of_band_input_counted_as_errors() {
    let service = AcarsService::new();

    assert!(service.process_datagram(b"{truncated", "acars").is_none());
    assert!(service.process_datagram(b"\xff\xfe", "acars").is_none());

    let stats = service.get_stats();
    assert_eq!(stats["sources"]["acars"]["errors"], 2);
    assert_eq!(stats["sources"]["acars"]["total"], 0);
}
