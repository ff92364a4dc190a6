use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observations::AircraftObservation;

/// Groups sightings of one ICAO address into a continuous tracking session.
/// A session stays open while the gap between sightings is within the
/// continuity window; it ends implicitly when queries bounded by `last_seen`
/// stop including it.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::aircraft_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AircraftSession {
    pub id: Uuid,
    pub icao_hex: String,
    pub callsign: Option<String>,
    pub source: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_positions: i32,
    pub min_altitude: Option<i32>,
    pub max_altitude: Option<i32>,
    pub min_distance_nm: Option<f64>,
    pub max_distance_nm: Option<f64>,
    /// Largest |vertical rate| seen during the session, feet/min
    pub max_vertical_rate: Option<i32>,
    pub min_rssi: Option<f64>,
    pub max_rssi: Option<f64>,
    pub is_military: bool,
    pub category: Option<String>,
    pub aircraft_type: Option<String>,
}

impl AircraftSession {
    /// Open a new session from the first sighting.
    pub fn open(obs: &AircraftObservation, distance_nm: Option<f64>) -> Self {
        AircraftSession {
            id: Uuid::new_v4(),
            icao_hex: obs.icao.clone(),
            callsign: obs.callsign.clone(),
            source: obs.source.to_string(),
            first_seen: obs.seen_at,
            last_seen: obs.seen_at,
            total_positions: 1,
            min_altitude: obs.altitude_baro,
            max_altitude: obs.altitude_baro,
            min_distance_nm: distance_nm,
            max_distance_nm: distance_nm,
            max_vertical_rate: obs.vertical_rate.map(i32::abs),
            min_rssi: obs.rssi,
            max_rssi: obs.rssi,
            is_military: obs.is_military,
            category: obs.category.clone(),
            aircraft_type: obs.aircraft_type.clone(),
        }
    }

    /// Fold one more observation into the running aggregates. min values are
    /// non-increasing and max values non-decreasing over the session's life.
    pub fn absorb(&mut self, obs: &AircraftObservation, distance_nm: Option<f64>) {
        self.last_seen = obs.seen_at;
        self.total_positions += 1;

        if obs.callsign.is_some() {
            self.callsign = obs.callsign.clone();
        }
        if obs.is_military {
            self.is_military = true;
        }
        if self.aircraft_type.is_none() {
            self.aircraft_type = obs.aircraft_type.clone();
        }
        if self.category.is_none() {
            self.category = obs.category.clone();
        }

        if let Some(alt) = obs.altitude_baro {
            self.min_altitude = Some(self.min_altitude.map_or(alt, |m| m.min(alt)));
            self.max_altitude = Some(self.max_altitude.map_or(alt, |m| m.max(alt)));
        }
        if let Some(vr) = obs.vertical_rate {
            let vr = vr.abs();
            self.max_vertical_rate = Some(self.max_vertical_rate.map_or(vr, |m| m.max(vr)));
        }
        if let Some(dist) = distance_nm {
            self.min_distance_nm = Some(self.min_distance_nm.map_or(dist, |m| m.min(dist)));
            self.max_distance_nm = Some(self.max_distance_nm.map_or(dist, |m| m.max(dist)));
        }
        if let Some(rssi) = obs.rssi {
            self.min_rssi = Some(self.min_rssi.map_or(rssi, |m| m.min(rssi)));
            self.max_rssi = Some(self.max_rssi.map_or(rssi, |m| m.max(rssi)));
        }
    }
}
