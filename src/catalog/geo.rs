//! Great-circle distance helpers.

use crate::models::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push antipodal points just past 1
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

pub fn is_within_radius(center: Coordinates, point: Coordinates, radius_km: f64) -> bool {
    haversine_km(center, point) <= radius_km
}

/// `500m`, `3.2km`, `42km`
pub fn format_distance(distance_km: f64) -> String {
    let metres = (distance_km * 1000.0).round();
    if metres < 1000.0 {
        format!("{}m", metres as i64)
    } else if distance_km < 9.95 {
        format!("{:.1}km", distance_km)
    } else {
        format!("{}km", distance_km.round() as i64)
    }
}
