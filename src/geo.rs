//! Great-circle math shared by the pipeline, the safety monitor, and the
//! fan-out payload builders. All distances are nautical miles, all angles
//! degrees, all speeds knots.

/// Mean Earth radius in nautical miles
const EARTH_RADIUS_NM: f64 = 3440.065;

/// Haversine great-circle distance between two points, in nautical miles
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}

/// Validate that a pair of coordinates is present and within range.
/// Rejects (0, 0), which upstream feeds emit for missing positions.
pub fn is_valid_position(lat: Option<f64>, lon: Option<f64>) -> bool {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if lat.abs() < 0.001 && lon.abs() < 0.001 {
                return false;
            }
            (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
        }
        _ => false,
    }
}

/// Closure rate between two aircraft in knots, by projecting the relative
/// velocity vector onto the inter-aircraft bearing. Positive means the
/// aircraft are converging. Returns None when either aircraft lacks ground
/// speed or track, or the pair is co-located.
///
/// Uses a local flat-earth approximation (1 degree latitude = 60 nm,
/// longitude scaled by cos(lat)), which is plenty at conflict ranges.
pub fn closure_rate_kt(
    lat1: f64,
    lon1: f64,
    gs1: Option<f64>,
    track1: Option<f64>,
    lat2: f64,
    lon2: f64,
    gs2: Option<f64>,
    track2: Option<f64>,
) -> Option<f64> {
    let (gs1, track1) = (gs1?, track1?);
    let (gs2, track2) = (gs2?, track2?);

    let lat_diff = (lat2 - lat1) * 60.0;
    let lon_diff = (lon2 - lon1) * 60.0 * lat1.to_radians().cos();

    let dist = (lat_diff.powi(2) + lon_diff.powi(2)).sqrt();
    if dist < 0.001 {
        return None;
    }

    // Unit vector from aircraft 1 toward aircraft 2
    let ux = lon_diff / dist;
    let uy = lat_diff / dist;

    // Track is degrees clockwise from north: x = east, y = north
    let v1x = gs1 * track1.to_radians().sin();
    let v1y = gs1 * track1.to_radians().cos();
    let v2x = gs2 * track2.to_radians().sin();
    let v2y = gs2 * track2.to_radians().cos();

    let rel_vx = v2x - v1x;
    let rel_vy = v2y - v1y;

    // Negative relative velocity along the bearing = closing
    let closure = -(rel_vx * ux + rel_vy * uy);

    Some((closure * 10.0).round() / 10.0)
}
