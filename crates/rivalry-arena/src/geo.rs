//! Great-circle distance for the discovery proximity filter.

use rivalry_types::constants::EARTH_RADIUS_KM;
use rivalry_types::GeoPoint;

/// Haversine distance in kilometres.
#[must_use]
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[must_use]
pub fn within_km(a: GeoPoint, b: GeoPoint, radius_km: f64) -> bool {
    distance_km(a, b) <= radius_km
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn zero_distance() {
        assert!(distance_km(p(12.97, 77.59), p(12.97, 77.59)).abs() < 1e-9);
    }

    #[test]
    fn known_distance() {
        // Bengaluru to Chennai, roughly 290 km.
        let d = distance_km(p(12.9716, 77.5946), p(13.0827, 80.2707));
        assert!((280.0..300.0).contains(&d), "got {d}");
    }

    #[test]
    fn radius_filter() {
        let centre = p(12.9716, 77.5946);
        assert!(within_km(centre, p(13.1986, 77.7066), 50.0));
        assert!(!within_km(centre, p(13.0827, 80.2707), 50.0));
    }
}
