// Great-circle distance and polygon geometry shared by every index backend

mod polygon;

pub use polygon::{BoundingBox, PolygonError, PolygonRegion};

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True if both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        crate::report::is_valid_coordinate(self.lat, self.lon)
    }
}

/// Haversine great-circle distance in meters.
///
/// Used wherever a metric distance is needed independently of a backend's
/// native distance, so all backends rank results identically.
/// Symmetric by construction: only absolute deltas enter the formula.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).abs().to_radians();
    let delta_lambda = (b.lon - a.lon).abs().to_radians();

    let sin_phi = (delta_phi / 2.0).sin();
    let sin_lambda = (delta_lambda / 2.0).sin();
    let h = sin_phi * sin_phi + phi1.cos() * phi2.cos() * sin_lambda * sin_lambda;
    // Rounding can push h slightly above 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Point `distance_m` meters due north of `origin` (negative = south).
///
/// Handy for building fixtures at known distances along a meridian.
pub fn offset_north(origin: GeoPoint, distance_m: f64) -> GeoPoint {
    let delta = (distance_m / EARTH_RADIUS_M).to_degrees();
    GeoPoint::new(origin.lat + delta, origin.lon)
}
