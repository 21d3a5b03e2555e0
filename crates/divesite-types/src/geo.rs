//! Coordinate helpers for proximity checks and slipway lookups.

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Half-width, in degrees, of the box around a divesite inside which no other
/// divesite may be registered. Slightly more than 100 m of latitude.
pub const DIVESITE_EXCLUSION_DEGREES: f64 = 0.001;

/// Slipways further than this from a divesite are not considered nearby.
pub const NEARBY_SLIPWAY_KM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: Point, b: Point) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_same_point() {
        let p = Point::new(50.1, -5.2);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let d = haversine_km(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.05, "got {d}");
    }

    #[test]
    fn haversine_known_city_pair() {
        // Lyon to Paris
        let lyon = Point::new(45.7597, 4.8422);
        let paris = Point::new(48.8567, 2.3508);
        let d = haversine_km(lyon, paris);
        assert!((d - 392.2).abs() < 1.0, "got {d}");
    }
}
