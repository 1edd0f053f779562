//! Straight-line geometry on a spherical earth.

use crate::constants::{DISTANCE_DECIMALS, EARTH_RADIUS_KM};
use crate::models::AccuracyTier;

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Clamp guards asin against a drifting a few ulps above 1 for antipodes.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Distance as reported to clients, rounded to one decimal.
pub fn reported_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    round_to(haversine_km(lat1, lon1, lat2, lon2), DISTANCE_DECIMALS)
}

/// Coordinates as the given tier allows them to be shown.
pub fn degrade(latitude: f64, longitude: f64, tier: AccuracyTier) -> (f64, f64) {
    match tier.decimals() {
        None => (latitude, longitude),
        Some(decimals) => (round_to(latitude, decimals), round_to(longitude, decimals)),
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: [AccuracyTier; 3] = [AccuracyTier::Precise, AccuracyTier::Approximate, AccuracyTier::City];

    #[test]
    fn test_distance_is_zero_for_same_point() {
        assert_eq!(haversine_km(47.4979, 19.0402, 47.4979, 19.0402), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let points = [
            (47.0, 19.0, 47.05, 19.05),
            (-33.8688, 151.2093, 51.5074, -0.1278),
            (89.9, 179.9, -89.9, -179.9),
            (0.0, 0.0, 0.0, 180.0),
        ];
        for (lat1, lon1, lat2, lon2) in points {
            let there = haversine_km(lat1, lon1, lat2, lon2);
            let back = haversine_km(lat2, lon2, lat1, lon1);
            assert!((there - back).abs() < 1e-9, "{} vs {}", there, back);
        }
    }

    #[test]
    fn test_known_distances() {
        // One degree of latitude is ~111.19 km on this sphere.
        let one_degree = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((one_degree - 111.19).abs() < 0.01, "{}", one_degree);

        // Half the circumference between antipodes.
        let antipodes = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((antipodes - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);

        // Budapest to Vienna is roughly 214 km.
        let budapest_vienna = haversine_km(47.4979, 19.0402, 48.2082, 16.3738);
        assert!((budapest_vienna - 214.0).abs() < 2.0, "{}", budapest_vienna);
    }

    #[test]
    fn test_reported_distance_has_one_decimal() {
        let distance = reported_distance_km(47.0, 19.0, 47.05, 19.05);
        assert_eq!(distance, round_to(distance, 1));
        assert!((distance - 6.7).abs() < 0.11, "{}", distance);
    }

    #[test]
    fn test_degrade_tiers() {
        assert_eq!(degrade(47.123456, 19.987654, AccuracyTier::Precise), (47.123456, 19.987654));
        assert_eq!(degrade(47.123456, 19.987654, AccuracyTier::Approximate), (47.123, 19.988));
        assert_eq!(degrade(47.123456, 19.987654, AccuracyTier::City), (47.1, 20.0));
        assert_eq!(degrade(-33.86882, -151.20929, AccuracyTier::City), (-33.9, -151.2));
    }

    #[test]
    fn test_degrade_is_idempotent() {
        let samples = [
            (47.0, 19.0),
            (47.05, 19.05),
            (-89.99951, 179.99949),
            (12.3456789, -98.7654321),
            (0.00049, -0.00051),
            (90.0, -180.0),
        ];
        for (lat, lon) in samples {
            for tier in TIERS {
                let once = degrade(lat, lon, tier);
                let twice = degrade(once.0, once.1, tier);
                assert_eq!(once, twice, "tier {:?} at ({}, {})", tier, lat, lon);
            }
        }
    }
}
