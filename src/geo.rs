//! Geographic utilities
//!
//! Pure distance/bearing math on a spherical Earth. Used by the geofence
//! evaluator and for tour distance metadata; no state, no side effects.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (spherical approximation)
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84-like geographic point, degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,

    /// Optional human-readable label (place name, address)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            label: None,
        }
    }
}

/// Great-circle distance between two points in meters (haversine)
///
/// Symmetric, and zero for coincident points. Accuracy is within ~0.5%
/// of the true geodesic, which is far below GPS noise at walking scale.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Initial compass bearing from `from` to `to`, degrees in [0, 360)
pub fn bearing(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let d_lon = (to.longitude - from.longitude).to_radians();
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// True when `point` lies within `radius_m + buffer_m` of `center`
pub fn is_within_radius(point: &GeoPoint, center: &GeoPoint, radius_m: f64, buffer_m: f64) -> bool {
    distance(point, center) <= radius_m + buffer_m
}

/// Total length of a polyline in meters (sum of consecutive segments)
pub fn route_distance(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}
