use incident_common::GeoPoint;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two lat/lon points in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Great-circle distance in meters, or `f64::INFINITY` when either side has
/// no coordinates, so absent geodata never passes a radius check.
pub fn distance_meters(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => haversine_meters(a.lat, a.lon, b.lat, b.lon),
        _ => f64::INFINITY,
    }
}

/// Arithmetic mean of the given points. `None` for an empty slice.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
    Some(GeoPoint::new(lat / n, lon / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Seoul City Hall and Gwanghwamun Square are roughly 700m apart.
    const CITY_HALL: GeoPoint = GeoPoint { lat: 37.5663, lon: 126.9779 };
    const GWANGHWAMUN: GeoPoint = GeoPoint { lat: 37.5725, lon: 126.9769 };

    #[test]
    fn same_point_is_zero() {
        assert_eq!(distance_meters(Some(CITY_HALL), Some(CITY_HALL)), 0.0);
    }

    #[test]
    fn known_distance() {
        let d = distance_meters(Some(CITY_HALL), Some(GWANGHWAMUN));
        assert!(d > 650.0 && d < 750.0, "expected ~690m, got {d}");
    }

    #[test]
    fn symmetric() {
        let ab = distance_meters(Some(CITY_HALL), Some(GWANGHWAMUN));
        let ba = distance_meters(Some(GWANGHWAMUN), Some(CITY_HALL));
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude() {
        // 2πR / 360
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");
    }

    #[test]
    fn missing_side_is_infinite() {
        assert_eq!(distance_meters(None, Some(CITY_HALL)), f64::INFINITY);
        assert_eq!(distance_meters(Some(CITY_HALL), None), f64::INFINITY);
        assert_eq!(distance_meters(None, None), f64::INFINITY);
    }

    #[test]
    fn centroid_is_mean() {
        let c = centroid(&[
            GeoPoint::new(37.0, 127.0),
            GeoPoint::new(37.2, 127.4),
            GeoPoint::new(37.1, 127.2),
        ])
        .unwrap();
        assert!((c.lat - 37.1).abs() < 1e-9);
        assert!((c.lon - 127.2).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_nothing() {
        assert!(centroid(&[]).is_none());
    }
}
