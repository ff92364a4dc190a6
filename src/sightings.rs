use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observations::AircraftObservation;

/// A persisted point-in-time copy of one observation, plus the computed
/// great-circle distance from the feeder site. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::aircraft_sightings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AircraftSighting {
    pub id: Uuid,
    pub seen_at: DateTime<Utc>,
    pub icao_hex: String,
    pub callsign: Option<String>,
    pub squawk: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_baro: Option<i32>,
    pub altitude_geom: Option<i32>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub vertical_rate: Option<i32>,
    pub distance_nm: Option<f64>,
    pub rssi: Option<f64>,
    pub category: Option<String>,
    pub aircraft_type: Option<String>,
    pub is_military: bool,
    pub is_emergency: bool,
    pub source: String,
}

impl AircraftSighting {
    /// Build a sighting row from an observation. `distance_nm` is computed
    /// by the caller so the feeder location is threaded once per cycle.
    pub fn from_observation(obs: &AircraftObservation, distance_nm: Option<f64>) -> Self {
        AircraftSighting {
            id: Uuid::new_v4(),
            seen_at: obs.seen_at,
            icao_hex: obs.icao.clone(),
            callsign: obs.callsign.clone(),
            squawk: obs.squawk.clone(),
            latitude: obs.lat,
            longitude: obs.lon,
            altitude_baro: obs.altitude_baro,
            altitude_geom: obs.altitude_geom,
            ground_speed: obs.ground_speed,
            track: obs.track,
            vertical_rate: obs.vertical_rate,
            distance_nm,
            rssi: obs.rssi,
            category: obs.category.clone(),
            aircraft_type: obs.aircraft_type.clone(),
            is_military: obs.is_military,
            is_emergency: obs.is_emergency_squawk(),
            source: obs.source.to_string(),
        }
    }
}
