use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo;

/// Which downlink channel an observation arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChannel {
    /// 1090 MHz Mode S / ADS-B
    Adsb1090,
    /// 978 MHz UAT
    Uat978,
}

impl std::fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceChannel::Adsb1090 => write!(f, "1090"),
            SourceChannel::Uat978 => write!(f, "978"),
        }
    }
}

/// One aircraft as reported by a single upstream poll. The permissive wire
/// JSON is narrowed into this record once at ingress; nothing downstream
/// touches the raw map.
///
/// Invariants: `icao` is non-empty uppercase hex; when position is present
/// both lat and lon are present and in range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircraftObservation {
    pub icao: String,
    pub callsign: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Barometric altitude in feet. The wire value "ground" becomes
    /// `None` + `on_ground = true`.
    pub altitude_baro: Option<i32>,
    pub altitude_geom: Option<i32>,
    pub on_ground: bool,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    /// Vertical rate in feet/min, barometric preferred over geometric
    pub vertical_rate: Option<i32>,
    pub squawk: Option<String>,
    pub rssi: Option<f64>,
    pub aircraft_type: Option<String>,
    pub category: Option<String>,
    pub is_military: bool,
    pub source: SourceChannel,
    pub seen_at: DateTime<Utc>,
}

/// Parse an altitude field that may be a number or the sentinel "ground".
/// Returns (altitude, on_ground).
fn parse_altitude(value: Option<&Value>) -> (Option<i32>, bool) {
    match value {
        Some(Value::String(s)) if s == "ground" => (None, true),
        Some(Value::Number(n)) => (n.as_f64().map(|f| f.round() as i32), false),
        _ => (None, false),
    }
}

fn str_field(ac: &Value, key: &str) -> Option<String> {
    ac.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn f64_field(ac: &Value, key: &str) -> Option<f64> {
    ac.get(key).and_then(Value::as_f64)
}

impl AircraftObservation {
    /// Narrow one entry of the upstream `aircraft` array. Returns None when
    /// the entry has no usable ICAO address.
    pub fn from_wire(ac: &Value, source: SourceChannel, seen_at: DateTime<Utc>) -> Option<Self> {
        let icao = ac
            .get("hex")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())?;

        let mut lat = f64_field(ac, "lat");
        let mut lon = f64_field(ac, "lon");
        if !geo::is_valid_position(lat, lon) {
            lat = None;
            lon = None;
        }

        let (altitude_baro, on_ground) = parse_altitude(ac.get("alt_baro"));
        let (altitude_geom, _) = parse_altitude(ac.get("alt_geom"));

        let vertical_rate = ac
            .get("baro_rate")
            .or_else(|| ac.get("geom_rate"))
            .and_then(Value::as_f64)
            .map(|v| v.round() as i32);

        // dbFlags bit 0 marks military airframes in the upstream database
        let is_military = ac
            .get("dbFlags")
            .and_then(Value::as_u64)
            .map(|flags| flags & 1 != 0)
            .unwrap_or(false);

        Some(AircraftObservation {
            icao,
            callsign: str_field(ac, "flight").map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            lat,
            lon,
            altitude_baro,
            altitude_geom,
            on_ground,
            ground_speed: f64_field(ac, "gs"),
            track: f64_field(ac, "track"),
            vertical_rate,
            squawk: str_field(ac, "squawk"),
            rssi: f64_field(ac, "rssi"),
            aircraft_type: str_field(ac, "t"),
            category: str_field(ac, "category"),
            is_military,
            source,
            seen_at,
        })
    }

    /// Best available altitude: barometric preferred, geometric fallback
    pub fn altitude(&self) -> Option<i32> {
        self.altitude_baro.or(self.altitude_geom)
    }

    pub fn has_position(&self) -> bool {
        geo::is_valid_position(self.lat, self.lon)
    }

    pub fn is_emergency_squawk(&self) -> bool {
        matches!(self.squawk.as_deref(), Some("7500" | "7600" | "7700"))
    }

    /// Display name for messages: callsign when present, else the hex address
    pub fn display_name(&self) -> &str {
        self.callsign.as_deref().unwrap_or(&self.icao)
    }

    /// Distance from the feeder site, when the observation has a position
    pub fn distance_from(&self, feeder_lat: f64, feeder_lon: f64) -> Option<f64> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if self.has_position() => {
                Some(geo::distance_nm(feeder_lat, feeder_lon, lat, lon))
            }
            _ => None,
        }
    }

    /// Point-in-time telemetry snapshot embedded in safety events and alert
    /// history rows.
    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "hex": &self.icao,
            "flight": &self.callsign,
            "lat": self.lat,
            "lon": self.lon,
            "alt_baro": self.altitude_baro,
            "alt_geom": self.altitude_geom,
            "gs": self.ground_speed,
            "track": self.track,
            "baro_rate": self.vertical_rate,
            "squawk": &self.squawk,
            "category": &self.category,
            "rssi": self.rssi,
            "emergency": self.is_emergency_squawk(),
        })
    }

    /// Compact payload for the fan-out `aircraft` stream
    pub fn simplified(&self, feeder_lat: f64, feeder_lon: f64) -> Value {
        let distance_nm = self
            .distance_from(feeder_lat, feeder_lon)
            .map(|d| (d * 10.0).round() / 10.0);
        serde_json::json!({
            "hex": &self.icao,
            "flight": self.callsign.as_deref().unwrap_or(""),
            "lat": self.lat,
            "lon": self.lon,
            "alt": self.altitude_baro,
            "gs": self.ground_speed,
            "track": self.track,
            "vr": self.vertical_rate,
            "squawk": &self.squawk,
            "category": &self.category,
            "type": &self.aircraft_type,
            "rssi": self.rssi,
            "distance_nm": distance_nm,
            "military": self.is_military,
            "emergency": self.is_emergency_squawk(),
        })
    }
}

/// Parse the `aircraft` array from one upstream response body. Entries
/// without an ICAO address are dropped.
pub fn parse_aircraft_json(
    body: &Value,
    source: SourceChannel,
    seen_at: DateTime<Utc>,
) -> Vec<AircraftObservation> {
    body.get("aircraft")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|ac| AircraftObservation::from_wire(ac, source, seen_at))
                .collect()
        })
        .unwrap_or_default()
}
