use crate::geo;

/// A major airport used for takeoff/landing conflict suppression
pub struct MajorAirport {
    pub icao: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// Class B and C primary airports. Aircraft pairs maneuvering vertically in
/// opposite directions near one of these are treated as normal arrival/
/// departure traffic rather than a conflict.
pub const MAJOR_AIRPORTS: &[MajorAirport] = &[
    MajorAirport { icao: "KATL", lat: 33.6367, lon: -84.4281 },
    MajorAirport { icao: "KBOS", lat: 42.3656, lon: -71.0096 },
    MajorAirport { icao: "KBWI", lat: 39.1754, lon: -76.6683 },
    MajorAirport { icao: "KCLT", lat: 35.2140, lon: -80.9431 },
    MajorAirport { icao: "KDCA", lat: 38.8521, lon: -77.0377 },
    MajorAirport { icao: "KDEN", lat: 39.8617, lon: -104.6731 },
    MajorAirport { icao: "KDFW", lat: 32.8968, lon: -97.0380 },
    MajorAirport { icao: "KDTW", lat: 42.2124, lon: -83.3534 },
    MajorAirport { icao: "KEWR", lat: 40.6925, lon: -74.1687 },
    MajorAirport { icao: "KFLL", lat: 26.0726, lon: -80.1527 },
    MajorAirport { icao: "KIAD", lat: 38.9445, lon: -77.4558 },
    MajorAirport { icao: "KIAH", lat: 29.9844, lon: -95.3414 },
    MajorAirport { icao: "KJFK", lat: 40.6398, lon: -73.7789 },
    MajorAirport { icao: "KLAS", lat: 36.0840, lon: -115.1537 },
    MajorAirport { icao: "KLAX", lat: 33.9425, lon: -118.4081 },
    MajorAirport { icao: "KLGA", lat: 40.7772, lon: -73.8726 },
    MajorAirport { icao: "KMCO", lat: 28.4294, lon: -81.3089 },
    MajorAirport { icao: "KMDW", lat: 41.7860, lon: -87.7524 },
    MajorAirport { icao: "KMEM", lat: 35.0424, lon: -89.9767 },
    MajorAirport { icao: "KMIA", lat: 25.7932, lon: -80.2906 },
    MajorAirport { icao: "KMSP", lat: 44.8820, lon: -93.2218 },
    MajorAirport { icao: "KORD", lat: 41.9786, lon: -87.9048 },
    MajorAirport { icao: "KPDX", lat: 45.5887, lon: -122.5975 },
    MajorAirport { icao: "KPHL", lat: 39.8719, lon: -75.2411 },
    MajorAirport { icao: "KPHX", lat: 33.4343, lon: -112.0116 },
    MajorAirport { icao: "KSAN", lat: 32.7336, lon: -117.1897 },
    MajorAirport { icao: "KSEA", lat: 47.4489, lon: -122.3094 },
    MajorAirport { icao: "KSFO", lat: 37.6190, lon: -122.3749 },
    MajorAirport { icao: "KSLC", lat: 40.7884, lon: -111.9778 },
    MajorAirport { icao: "KSTL", lat: 38.7487, lon: -90.3700 },
    MajorAirport { icao: "KTPA", lat: 27.9755, lon: -82.5332 },
];

/// Is the position within `radius_nm` of any major airport?
pub fn near_major_airport(lat: f64, lon: f64, radius_nm: f64) -> bool {
    MAJOR_AIRPORTS
        .iter()
        .any(|airport| geo::distance_nm(lat, lon, airport.lat, airport.lon) <= radius_nm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_ksea() {
        assert!(near_major_airport(47.4489, -122.3094, 5.0));
        // A point ~3 nm north of the KSEA reference
        assert!(near_major_airport(47.50, -122.31, 5.0));
    }

    #[test]
    fn test_far_from_all_airports() {
        // Middle of the Pacific
        assert!(!near_major_airport(30.0, -150.0, 5.0));
    }
}
