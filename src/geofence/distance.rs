//! Great-circle distance.

use crate::config::defaults::EARTH_RADIUS_M;
use crate::types::Coordinate;

/// Haversine distance between two points, in meters.
pub fn haversine_distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = Coordinate::new(51.5007, -0.1246);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordinate::new(51.5007, -0.1246); // Big Ben
        let b = Coordinate::new(48.8584, 2.2945); // Eiffel Tower
        let ab = haversine_distance_m(a, b);
        let ba = haversine_distance_m(b, a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance() {
        // Big Ben to the Eiffel Tower is roughly 340 km.
        let a = Coordinate::new(51.5007, -0.1246);
        let b = Coordinate::new(48.8584, 2.2945);
        let d = haversine_distance_m(a, b);
        assert!((330_000.0..350_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_small_offset_is_meters() {
        // ~0.001 degrees of latitude is about 111 m.
        let a = Coordinate::new(40.0, -74.0);
        let b = Coordinate::new(40.001, -74.0);
        let d = haversine_distance_m(a, b);
        assert!((100.0..125.0).contains(&d), "got {d}");
    }
}
