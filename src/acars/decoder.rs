//! ACARS text enrichment: airline lookup from callsign prefixes, label
//! dictionary, coordinate extraction, H1 datalink decoding, OOOI events,
//! weather recognition, and airport-code extraction.
//!
//! Everything here is a pure function over the normalized message; the
//! service applies [`enrich_message`] after normalization and dedup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};

/// (ICAO, IATA, name)
const AIRLINES: &[(&str, &str, &str)] = &[
    ("AAL", "AA", "American Airlines"),
    ("ACA", "AC", "Air Canada"),
    ("AFR", "AF", "Air France"),
    ("ASA", "AS", "Alaska Airlines"),
    ("BAW", "BA", "British Airways"),
    ("DAL", "DL", "Delta Air Lines"),
    ("DLH", "LH", "Lufthansa"),
    ("EJA", "1I", "NetJets"),
    ("FDX", "FX", "FedEx Express"),
    ("FFT", "F9", "Frontier Airlines"),
    ("GTI", "5Y", "Atlas Air"),
    ("HAL", "HA", "Hawaiian Airlines"),
    ("JBU", "B6", "JetBlue Airways"),
    ("KLM", "KL", "KLM Royal Dutch Airlines"),
    ("NKS", "NK", "Spirit Airlines"),
    ("QFA", "QF", "Qantas"),
    ("QXE", "QX", "Horizon Air"),
    ("SKW", "OO", "SkyWest Airlines"),
    ("SWA", "WN", "Southwest Airlines"),
    ("UAE", "EK", "Emirates"),
    ("UAL", "UA", "United Airlines"),
    ("UPS", "5X", "UPS Airlines"),
    ("WJA", "WS", "WestJet"),
];

/// Resolve a 3-letter ICAO airline designator. Unknown codes echo the code
/// back with a placeholder name so callers can still render something.
pub fn find_airline_by_icao(code: &str) -> (String, String) {
    let code = code.to_uppercase();
    AIRLINES
        .iter()
        .find(|(icao, _, _)| *icao == code)
        .map(|(_, iata, name)| (iata.to_string(), name.to_string()))
        .unwrap_or_else(|| (code.clone(), "Unknown Airline".to_string()))
}

/// Resolve a 2-letter IATA airline designator.
pub fn find_airline_by_iata(code: &str) -> (String, String) {
    let code = code.to_uppercase();
    AIRLINES
        .iter()
        .find(|(_, iata, _)| *iata == code)
        .map(|(icao, _, name)| (icao.to_string(), name.to_string()))
        .unwrap_or_else(|| (code.clone(), "Unknown Airline".to_string()))
}

/// (label, name, description)
const LABELS: &[(&str, &str, &str)] = &[
    ("10", "Out", "Aircraft departed gate (OOOI Out)"),
    ("11", "Off", "Aircraft took off (OOOI Off)"),
    ("12", "On", "Aircraft landed (OOOI On)"),
    ("13", "In", "Aircraft arrived at gate (OOOI In)"),
    ("15", "ETA", "Estimated time of arrival report"),
    ("80", "OOOI Report", "Airline-defined OOOI movement report"),
    ("5Z", "Airline", "Airline designated downlink"),
    ("H1", "Datalink", "Message to/from on-board datalink systems"),
    ("Q0", "Link Test", "ACARS link test"),
    ("QA", "Weather", "Weather request or report"),
    ("QB", "Weather", "Weather request or report"),
    ("QC", "Weather", "Weather request or report"),
    ("QD", "Weather", "Weather request or report"),
    ("QE", "Weather", "Weather request or report"),
    ("QF", "Weather", "Weather request or report"),
    ("Q1", "Weather", "Departure/arrival weather report"),
    ("Q2", "Weather", "Weather request"),
    ("SA", "Media Report", "Media advisory or VHF link status"),
    ("SQ", "Squitter", "Ground station squitter"),
    ("_d", "No Info", "No information to transmit (polled mode)"),
];

pub fn lookup_label(label: &str) -> Option<(&'static str, &'static str)> {
    LABELS
        .iter()
        .find(|(l, _, _)| *l == label)
        .map(|(_, name, desc)| (*name, *desc))
}

/// Label name, falling back to the label itself when unknown.
pub fn get_label_name(label: &str) -> String {
    lookup_label(label)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| label.to_string())
}

/// Decode a label into a small info object (None fields when unknown).
pub fn decode_label(label: Option<&str>) -> Value {
    let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
        return json!({"label": null, "name": null, "description": null});
    };
    match lookup_label(label) {
        Some((name, description)) => json!({
            "label": label,
            "name": name,
            "description": description,
        }),
        None => json!({"label": label, "name": null, "description": null}),
    }
}

/// Parsed callsign pieces. Airline fields stay None when the prefix is not
/// a known carrier.
pub fn parse_callsign(callsign: Option<&str>) -> Value {
    let Some(raw) = callsign
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
    else {
        return json!({
            "callsign": null,
            "airline_code": null,
            "airline_icao": null,
            "airline_iata": null,
            "airline_name": null,
            "flight_number": null,
            "format": "unknown",
        });
    };

    static ICAO_FORM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([A-Z]{3})(\d*)$").expect("static regex"));
    static IATA_FORM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9])(\d*)$").expect("static regex"));

    if let Some(caps) = ICAO_FORM.captures(&raw) {
        let code = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let number = caps
            .get(2)
            .map(|m| m.as_str().trim_start_matches('0').to_string())
            .filter(|n| !n.is_empty());
        let known = AIRLINES.iter().find(|(icao, _, _)| *icao == code);
        return json!({
            "callsign": raw,
            "airline_code": code,
            "airline_icao": code,
            "airline_iata": known.map(|(_, iata, _)| *iata),
            "airline_name": known.map(|(_, _, name)| *name),
            "flight_number": number,
            "format": "icao",
        });
    }

    if let Some(caps) = IATA_FORM.captures(&raw) {
        let code = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let number = caps
            .get(2)
            .map(|m| m.as_str().trim_start_matches('0').to_string())
            .filter(|n| !n.is_empty());
        let known = AIRLINES.iter().find(|(_, iata, _)| *iata == code);
        return json!({
            "callsign": raw,
            "airline_code": code,
            "airline_icao": known.map(|(icao, _, _)| *icao),
            "airline_iata": code,
            "airline_name": known.map(|(_, _, name)| *name),
            "flight_number": number,
            "format": "iata",
        });
    }

    json!({
        "callsign": raw,
        "airline_code": null,
        "airline_icao": null,
        "airline_iata": null,
        "airline_name": null,
        "flight_number": null,
        "format": "unknown",
    })
}

pub fn validate_coordinates(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Extract a position from free text. Two wire formats appear in practice:
/// packed degrees + minutes-in-tenths (`N47300W122180`) and decimal degrees
/// (`N 49.128,W122.374`).
pub fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    if text.is_empty() {
        return None;
    }

    static PACKED: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"([NS])(\d{2})(\d{3})\s*([EW])(\d{3})(\d{3})").expect("static regex")
    });
    static DECIMAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"([NS])\s*(\d{1,2}\.\d+)\s*,\s*([EW])\s*(\d{1,3}\.\d+)").expect("static regex")
    });

    if let Some(caps) = PACKED.captures(text) {
        let lat_deg: f64 = caps[2].parse().ok()?;
        let lat_min_tenths: f64 = caps[3].parse().ok()?;
        let lon_deg: f64 = caps[5].parse().ok()?;
        let lon_min_tenths: f64 = caps[6].parse().ok()?;

        let mut lat = lat_deg + lat_min_tenths / 10.0 / 60.0;
        let mut lon = lon_deg + lon_min_tenths / 10.0 / 60.0;
        if &caps[1] == "S" {
            lat = -lat;
        }
        if &caps[4] == "W" {
            lon = -lon;
        }
        if validate_coordinates(lat, lon) {
            return Some((lat, lon));
        }
        return None;
    }

    if let Some(caps) = DECIMAL.captures(text) {
        let mut lat: f64 = caps[2].parse().ok()?;
        let mut lon: f64 = caps[4].parse().ok()?;
        if &caps[1] == "S" {
            lat = -lat;
        }
        if &caps[3] == "W" {
            lon = -lon;
        }
        if validate_coordinates(lat, lon) {
            return Some((lat, lon));
        }
    }

    None
}

/// Decode H1 (datalink) message bodies: FPN flight plans, POS position
/// reports, PRG progress reports.
pub fn decode_h1_message(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }

    if text.contains("FPN/") {
        static DA: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"/?DA:([A-Z]{4})").expect("static regex"));
        static AA: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"/?AA:([A-Z]{4})").expect("static regex"));
        let mut decoded = Map::new();
        decoded.insert("message_type".into(), json!("Flight Plan"));
        if let Some(caps) = DA.captures(text) {
            decoded.insert("origin".into(), json!(&caps[1]));
        }
        if let Some(caps) = AA.captures(text) {
            decoded.insert("destination".into(), json!(&caps[1]));
        }
        return Some(Value::Object(decoded));
    }

    if text.contains("POS/") || text.starts_with("POS") {
        let mut decoded = Map::new();
        decoded.insert("message_type".into(), json!("Position Report"));
        if let Some((lat, lon)) = parse_coordinates(text) {
            decoded.insert("position".into(), json!({"lat": lat, "lon": lon}));
        }
        static ALT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/A(\d{4,5})").expect("static regex"));
        if let Some(caps) = ALT.captures(text) {
            if let Ok(altitude) = caps[1].parse::<i64>() {
                decoded.insert("altitude_ft".into(), json!(altitude));
                decoded.insert("flight_level".into(), json!(format!("FL{}", altitude / 100)));
            }
        }
        return Some(Value::Object(decoded));
    }

    if text.contains("PRG/") {
        let mut decoded = Map::new();
        decoded.insert("message_type".into(), json!("Progress Report"));
        static DT: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"DT([A-Z]{4})").expect("static regex"));
        if let Some(caps) = DT.captures(text) {
            decoded.insert("destination".into(), json!(&caps[1]));
        }
        return Some(Value::Object(decoded));
    }

    None
}

/// Four-letter tokens with these leading letters are plausible ICAO airport
/// codes in the regions this feeder can hear
const AIRPORT_REGION_PREFIXES: &[char] = &['C', 'K', 'P', 'E', 'G', 'L', 'S'];

/// Common English words that would otherwise read as airport codes
const AIRPORT_STOPWORDS: &[&str] = &[
    "CALL", "CLMB", "COST", "CREW", "EACH", "EAST", "ELSE", "ETAS", "GATE", "GOOD", "KEEP",
    "KIND", "KNOW", "LAND", "LAST", "LATE", "LEFT", "LESS", "LINE", "LIST", "LOAD", "LONG",
    "LOOK", "PAGE", "PASS", "PLAN", "PLUS", "PUSH", "SEND", "SHOW", "SITE", "SOON", "STAR",
    "STOP", "SUCH", "SURE",
];

fn extract_airport_codes(text: &str) -> Vec<String> {
    static CODE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b([A-Z]{4})\b").expect("static regex"));
    let mut codes: Vec<String> = Vec::new();
    for caps in CODE.captures_iter(text) {
        let code = caps[1].to_string();
        let leading = code.chars().next().unwrap_or(' ');
        if !AIRPORT_REGION_PREFIXES.contains(&leading) {
            continue;
        }
        if AIRPORT_STOPWORDS.contains(&code.as_str()) {
            continue;
        }
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

const WEATHER_KEYWORDS: &[&str] = &["METAR", "SPECI", "TAF", "SIGMET", "AIRMET", "PIREP"];

/// Decode a message text body according to its label family. Returns an
/// empty object when there is nothing to say.
pub fn decode_message_text(text: &str, label: Option<&str>) -> Value {
    if text.is_empty() {
        return json!({});
    }

    let mut decoded = Map::new();

    // Ground station squitter: version + X + network + IATA + ICAO + ...
    static SQUITTER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\d{2}X([SA])([A-Z]{3})([A-Z]{4})").expect("static regex"));
    if let Some(caps) = SQUITTER.captures(text) {
        decoded.insert("message_type".into(), json!("Ground Station Squitter"));
        decoded.insert(
            "network".into(),
            json!(if &caps[1] == "S" { "SITA" } else { "ARINC" }),
        );
        decoded.insert("station_iata".into(), json!(&caps[2]));
        decoded.insert("station_icao".into(), json!(&caps[3]));
        return Value::Object(decoded);
    }

    match label {
        Some("10") | Some("11") | Some("12") | Some("13") => {
            decoded.insert("message_type".into(), json!("OOOI Event"));
            let event = match label {
                Some("10") => "Out",
                Some("11") => "Off",
                Some("12") => "On",
                _ => "In",
            };
            decoded.insert("event_type".into(), json!(event));
        }
        Some("80") => {
            decoded.insert("message_type".into(), json!("OOOI Event"));
            // Airline-defined movement reports carry the phase in the body
            for (keyword, event) in [("OUT", "Out"), ("OFF", "Off"), ("ON", "On"), ("IN", "In")] {
                if text
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|tok| tok == keyword)
                {
                    decoded.insert("event_type".into(), json!(event));
                    break;
                }
            }
        }
        Some(l) if l.starts_with('Q') => {
            decoded.insert("message_type".into(), json!("Weather"));
            if let Some(keyword) = WEATHER_KEYWORDS
                .iter()
                .find(|k| text.starts_with(**k) || text.contains(&format!("{} ", k)))
            {
                decoded.insert("weather_type".into(), json!(*keyword));
            }
        }
        Some("H1") => {
            if let Some(Value::Object(h1)) = decode_h1_message(text) {
                for (k, v) in h1 {
                    decoded.insert(k, v);
                }
            }
        }
        _ => {}
    }

    if let Some((lat, lon)) = parse_coordinates(text)
        && !decoded.contains_key("position")
    {
        decoded.insert("position".into(), json!({"lat": lat, "lon": lon}));
    }

    let airports = extract_airport_codes(text);
    if !airports.is_empty() {
        decoded.insert("airports_mentioned".into(), json!(airports));
    }

    Value::Object(decoded)
}

/// Full enrichment pass: airline from callsign prefix, label info, decoded
/// text analysis. Input and output are the normalized message's decoded
/// extension map.
pub fn enrich_message(
    callsign: Option<&str>,
    label: Option<&str>,
    text: Option<&str>,
) -> Value {
    let mut enriched = Map::new();

    let parsed = parse_callsign(callsign);
    if parsed["airline_code"] != Value::Null {
        // Prefer the 3-letter ICAO table, fall back to 2-letter IATA
        enriched.insert(
            "airline".into(),
            json!({
                "icao": &parsed["airline_icao"],
                "iata": &parsed["airline_iata"],
                "name": &parsed["airline_name"],
                "flight_number": &parsed["flight_number"],
                "format": &parsed["format"],
            }),
        );
    }

    if label.is_some() {
        enriched.insert("label_info".into(), decode_label(label));
    }

    if let Some(text) = text {
        let decoded = decode_message_text(text, label);
        if decoded.as_object().is_some_and(|o| !o.is_empty()) {
            enriched.insert("decoded".into(), decoded);
        }
    }

    Value::Object(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airline_by_icao() {
        assert_eq!(
            find_airline_by_icao("AAL"),
            ("AA".to_string(), "American Airlines".to_string())
        );
        assert_eq!(
            find_airline_by_icao("DAL"),
            ("DL".to_string(), "Delta Air Lines".to_string())
        );
        assert_eq!(
            find_airline_by_icao("UPS"),
            ("5X".to_string(), "UPS Airlines".to_string())
        );
        assert_eq!(
            find_airline_by_icao("XYZ"),
            ("XYZ".to_string(), "Unknown Airline".to_string())
        );
    }

    #[test]
    fn test_airline_by_iata() {
        assert_eq!(
            find_airline_by_iata("AA"),
            ("AAL".to_string(), "American Airlines".to_string())
        );
        assert_eq!(
            find_airline_by_iata("XX"),
            ("XX".to_string(), "Unknown Airline".to_string())
        );
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(lookup_label("10").unwrap().0, "Out");
        assert_eq!(lookup_label("11").unwrap().0, "Off");
        assert_eq!(lookup_label("12").unwrap().0, "On");
        assert_eq!(lookup_label("13").unwrap().0, "In");
        assert_eq!(lookup_label("H1").unwrap().0, "Datalink");
        for label in ["QA", "QB", "QC", "QD", "QE", "QF"] {
            assert_eq!(lookup_label(label).unwrap().0, "Weather");
        }
        assert!(lookup_label("ZZ").is_none());
        assert_eq!(get_label_name("ZZ"), "ZZ");
    }

    #[test]
    fn test_parse_callsign_icao_format() {
        let parsed = parse_callsign(Some("AAL123"));
        assert_eq!(parsed["airline_icao"], "AAL");
        assert_eq!(parsed["airline_iata"], "AA");
        assert_eq!(parsed["airline_name"], "American Airlines");
        assert_eq!(parsed["flight_number"], "123");
        assert_eq!(parsed["format"], "icao");
    }

    #[test]
    fn test_parse_callsign_leading_zeros_stripped() {
        let parsed = parse_callsign(Some("DAL0012"));
        assert_eq!(parsed["flight_number"], "12");
    }

    #[test]
    fn test_parse_callsign_unknown_icao_airline() {
        let parsed = parse_callsign(Some("XYZ789"));
        assert_eq!(parsed["airline_icao"], "XYZ");
        assert_eq!(parsed["airline_iata"], Value::Null);
        assert_eq!(parsed["airline_name"], Value::Null);
        assert_eq!(parsed["flight_number"], "789");
    }

    #[test]
    fn test_parse_callsign_iata_format() {
        let parsed = parse_callsign(Some("AA123"));
        assert_eq!(parsed["airline_icao"], "AAL");
        assert_eq!(parsed["airline_iata"], "AA");
        assert_eq!(parsed["format"], "iata");
    }

    #[test]
    fn test_parse_callsign_normalization() {
        let parsed = parse_callsign(Some("  ual123  "));
        assert_eq!(parsed["callsign"], "UAL123");
        assert_eq!(parsed["airline_icao"], "UAL");
    }

    #[test]
    fn test_parse_callsign_airline_only_and_empty() {
        let parsed = parse_callsign(Some("UAL"));
        assert_eq!(parsed["airline_icao"], "UAL");
        assert_eq!(parsed["flight_number"], Value::Null);

        let parsed = parse_callsign(Some(""));
        assert_eq!(parsed["callsign"], Value::Null);
        assert_eq!(parsed["format"], "unknown");

        let parsed = parse_callsign(None);
        assert_eq!(parsed["format"], "unknown");
    }

    #[test]
    fn test_parse_coordinates_packed() {
        let (lat, lon) = parse_coordinates("N47300W122180").unwrap();
        assert!((lat - 47.5).abs() < 0.01);
        assert!((lon + 122.3).abs() < 0.01);

        let (lat, lon) = parse_coordinates("S33300E151120").unwrap();
        assert!(lat < 0.0);
        assert!(lon > 0.0);
    }

    #[test]
    fn test_parse_coordinates_decimal() {
        let (lat, lon) = parse_coordinates("N 49.128,W122.374").unwrap();
        assert!((lat - 49.128).abs() < 0.001);
        assert!((lon + 122.374).abs() < 0.001);
    }

    #[test]
    fn test_parse_coordinates_invalid_and_absent() {
        assert!(parse_coordinates("N95000W122000").is_none());
        assert!(parse_coordinates("").is_none());
        assert!(parse_coordinates("no coordinates here").is_none());
    }

    #[test]
    fn test_decode_h1_flight_plan() {
        let decoded = decode_h1_message("FPN/DA:KJFK/AA:KLAX/F:JUDDS.HOFFA.PIREX").unwrap();
        assert_eq!(decoded["message_type"], "Flight Plan");
        assert_eq!(decoded["origin"], "KJFK");
        assert_eq!(decoded["destination"], "KLAX");
    }

    #[test]
    fn test_decode_h1_position_report() {
        let decoded = decode_h1_message("/POS/N47300W122180/A35000").unwrap();
        assert_eq!(decoded["message_type"], "Position Report");
        assert!(decoded.get("position").is_some());
        assert_eq!(decoded["altitude_ft"], 35000);
        assert_eq!(decoded["flight_level"], "FL350");
    }

    #[test]
    fn test_decode_h1_progress_report() {
        let decoded = decode_h1_message("PRG/ABC123/DTKLAX").unwrap();
        assert_eq!(decoded["message_type"], "Progress Report");
        assert_eq!(decoded["destination"], "KLAX");
    }

    #[test]
    fn test_decode_h1_unknown() {
        assert!(decode_h1_message("Some random content").is_none());
        assert!(decode_h1_message("").is_none());
    }

    #[test]
    fn test_decode_ground_station_squitter() {
        let decoded = decode_message_text("02XSABQKABQ03502N10636WV136975", None);
        assert_eq!(decoded["message_type"], "Ground Station Squitter");
        assert_eq!(decoded["network"], "SITA");
    }

    #[test]
    fn test_decode_oooi_events() {
        for (label, event) in [("10", "Out"), ("11", "Off"), ("12", "On"), ("13", "In")] {
            let decoded = decode_message_text("movement message", Some(label));
            assert_eq!(decoded["message_type"], "OOOI Event");
            assert_eq!(decoded["event_type"], event, "label {label}");
        }
    }

    #[test]
    fn test_decode_weather_types() {
        let decoded =
            decode_message_text("METAR KJFK 121856Z 24008KT 10SM FEW250 28/17 A2998", Some("QA"));
        assert_eq!(decoded["message_type"], "Weather");
        assert_eq!(decoded["weather_type"], "METAR");

        let decoded =
            decode_message_text("TAF KLAX 121720Z 1218/1324 24010KT P6SM FEW250", Some("QB"));
        assert_eq!(decoded["weather_type"], "TAF");
    }

    #[test]
    fn test_decode_h1_routed_through_main_decoder() {
        let decoded = decode_message_text("FPN/DA:KJFK/AA:KLAX", Some("H1"));
        assert_eq!(decoded["message_type"], "Flight Plan");
    }

    #[test]
    fn test_airport_code_extraction() {
        let decoded = decode_message_text("Flight from KJFK to KLAX via KORD", None);
        let airports = decoded["airports_mentioned"].as_array().unwrap();
        for code in ["KJFK", "KLAX", "KORD"] {
            assert!(airports.iter().any(|c| c == code), "missing {code}");
        }
    }

    #[test]
    fn test_airport_code_prefix_and_stopword_filters() {
        let decoded = decode_message_text("ABCD KJFK XXXX KLAX GATE PLAN", None);
        let airports = decoded["airports_mentioned"].as_array().unwrap();
        assert!(airports.iter().any(|c| c == "KJFK"));
        assert!(airports.iter().any(|c| c == "KLAX"));
        assert!(!airports.iter().any(|c| c == "ABCD"));
        assert!(!airports.iter().any(|c| c == "XXXX"));
        assert!(!airports.iter().any(|c| c == "GATE"));
        assert!(!airports.iter().any(|c| c == "PLAN"));
    }

    #[test]
    fn test_decode_empty_text() {
        assert_eq!(decode_message_text("", None), json!({}));
    }

    #[test]
    fn test_enrich_message_full() {
        let enriched = enrich_message(Some("UAL456"), Some("10"), Some("Test message"));
        assert_eq!(enriched["airline"]["icao"], "UAL");
        assert_eq!(enriched["airline"]["iata"], "UA");
        assert_eq!(enriched["airline"]["name"], "United Airlines");
        assert_eq!(enriched["airline"]["flight_number"], "456");
        assert_eq!(enriched["label_info"]["name"], "Out");
        assert_eq!(enriched["decoded"]["event_type"], "Out");
    }

    #[test]
    fn test_enrich_message_without_callsign() {
        let enriched = enrich_message(None, Some("H1"), Some("PRG/X/DTKSEA"));
        assert!(enriched.get("airline").is_none());
        assert_eq!(enriched["decoded"]["destination"], "KSEA");
    }
}
