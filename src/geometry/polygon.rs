use super::{haversine_distance, GeoPoint};
use crate::report::is_valid_coordinate;
use geo::{BoundingRect, Contains, Coord, LineString, Point, Polygon};
use thiserror::Error;

/// Polygon input rejected before any index access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolygonError {
    #[error("lats and lngs must have the same length (got {lats} and {lngs})")]
    LengthMismatch { lats: usize, lngs: usize },
    #[error("a polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("vertex {index} out of range: latitude {lat}, longitude {lon}")]
    CoordinateOutOfRange { index: usize, lat: f64, lon: f64 },
}

/// Minimum bounding rectangle in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Great-circle length of the (min, min) → (max, max) diagonal, in meters
    pub fn diagonal_m(&self) -> f64 {
        haversine_distance(
            GeoPoint::new(self.min_lat, self.min_lon),
            GeoPoint::new(self.max_lat, self.max_lon),
        )
    }
}

/// A validated query polygon.
///
/// Vertices are kept in (lon, lat) order as a planar ring; the ring is closed
/// implicitly. Self-intersecting rings are not rejected and their containment
/// result is whatever the planar test yields.
#[derive(Clone, Debug)]
pub struct PolygonRegion {
    shape: Polygon<f64>,
    bounds: BoundingBox,
}

impl PolygonRegion {
    /// Build a polygon from parallel latitude / longitude arrays.
    pub fn new(lats: &[f64], lngs: &[f64]) -> Result<Self, PolygonError> {
        if lats.len() != lngs.len() {
            return Err(PolygonError::LengthMismatch {
                lats: lats.len(),
                lngs: lngs.len(),
            });
        }
        if lats.len() < 3 {
            return Err(PolygonError::TooFewVertices(lats.len()));
        }

        let mut ring = Vec::with_capacity(lats.len());
        for (index, (&lat, &lon)) in lats.iter().zip(lngs).enumerate() {
            if !is_valid_coordinate(lat, lon) {
                return Err(PolygonError::CoordinateOutOfRange { index, lat, lon });
            }
            ring.push(Coord { x: lon, y: lat });
        }

        let shape = Polygon::new(LineString::new(ring), vec![]);
        let rect = shape
            .bounding_rect()
            .ok_or(PolygonError::TooFewVertices(lats.len()))?;

        let bounds = BoundingBox {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lon: rect.min().x,
            max_lon: rect.max().x,
        };

        Ok(Self { shape, bounds })
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Number of distinct vertices (closing vertex excluded)
    pub fn vertex_count(&self) -> usize {
        self.shape.exterior().0.len().saturating_sub(1)
    }

    /// Circular candidate region around the MBR: centered on the MBR
    /// center, radius = diagonal × `margin` / 2.
    ///
    /// This covers the MBR only for boxes small or close to the equator.
    /// On the sphere the low-latitude corners of a wide high-latitude box
    /// lie further from the center than half the (min, min) → (max, max)
    /// diagonal, so agents near those corners are missed unless `margin`
    /// is raised. Example: the (60, 0)-(80, 90) box has a 1750 km half
    /// diagonal but its (60, 0) corner is 2315 km from the center.
    pub fn filter_circle(&self, margin: f64) -> (GeoPoint, f64) {
        let diagonal = self.bounds.diagonal_m() * margin;
        (self.bounds.center(), diagonal / 2.0)
    }

    /// Exact planar containment test in (lon, lat) space. Points on the
    /// boundary are outside.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.shape.contains(&Point::new(point.lon, point.lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> PolygonRegion {
        PolygonRegion::new(&[0.0, 0.0, 10.0, 10.0], &[0.0, 10.0, 10.0, 0.0]).unwrap()
    }

    #[test]
    fn test_square_contains_center_and_excludes_outside() {
        let region = square();
        assert!(region.contains(GeoPoint::new(5.0, 5.0)));
        assert!(!region.contains(GeoPoint::new(20.0, 20.0)));
        assert!(!region.contains(GeoPoint::new(-1.0, 5.0)));
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape: the notch at (7.5, 7.5) is outside
        let region = PolygonRegion::new(
            &[0.0, 10.0, 10.0, 5.0, 5.0, 0.0],
            &[0.0, 0.0, 5.0, 5.0, 10.0, 10.0],
        )
        .unwrap();
        assert!(region.contains(GeoPoint::new(2.5, 2.5)));
        assert!(region.contains(GeoPoint::new(7.5, 2.5)));
        assert!(region.contains(GeoPoint::new(2.5, 7.5)));
        assert!(!region.contains(GeoPoint::new(7.5, 7.5)));
    }

    #[test]
    fn test_rejects_two_vertices() {
        let result = PolygonRegion::new(&[0.0, 1.0], &[0.0, 1.0]);
        assert_eq!(result.unwrap_err(), PolygonError::TooFewVertices(2));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let result = PolygonRegion::new(&[0.0, 1.0, 2.0], &[0.0, 1.0]);
        assert_eq!(
            result.unwrap_err(),
            PolygonError::LengthMismatch { lats: 3, lngs: 2 }
        );
    }

    #[test]
    fn test_rejects_out_of_range_vertex() {
        let result = PolygonRegion::new(&[0.0, 95.0, 10.0], &[0.0, 10.0, 10.0]);
        assert!(matches!(
            result.unwrap_err(),
            PolygonError::CoordinateOutOfRange { index: 1, .. }
        ));

        let result = PolygonRegion::new(&[0.0, 5.0, 10.0], &[0.0, 10.0, 181.0]);
        assert!(matches!(
            result.unwrap_err(),
            PolygonError::CoordinateOutOfRange { index: 2, .. }
        ));
    }

    #[test]
    fn test_bounds_and_center() {
        let region = PolygonRegion::new(&[1.0, 3.0, 2.0], &[10.0, 12.0, 16.0]).unwrap();
        let bounds = region.bounds();
        assert_eq!(bounds.min_lat, 1.0);
        assert_eq!(bounds.max_lat, 3.0);
        assert_eq!(bounds.min_lon, 10.0);
        assert_eq!(bounds.max_lon, 16.0);
        assert_eq!(bounds.center(), GeoPoint::new(2.0, 13.0));
        assert_eq!(region.vertex_count(), 3);
    }

    #[test]
    fn test_filter_circle_covers_small_equatorial_square() {
        let region = square();
        let (center, radius) = region.filter_circle(1.1);
        assert_eq!(center, GeoPoint::new(5.0, 5.0));
        assert!((radius - region.bounds().diagonal_m() * 0.55).abs() < 1e-6);

        for (lat, lon) in [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)] {
            assert!(haversine_distance(center, GeoPoint::new(lat, lon)) <= radius);
        }
    }

    #[test]
    fn test_filter_circle_misses_corners_of_wide_high_latitude_box() {
        let region = PolygonRegion::new(&[60.0, 60.0, 80.0, 80.0], &[0.0, 90.0, 90.0, 0.0]).unwrap();

        let (center, radius) = region.filter_circle(1.1);
        assert_eq!(center, GeoPoint::new(70.0, 45.0));
        let low_corner = haversine_distance(center, GeoPoint::new(60.0, 0.0));
        assert!(low_corner > radius, "{} <= {}", low_corner, radius);

        // A larger margin brings the corner back inside
        let (_, wide_radius) = region.filter_circle(1.5);
        assert!(low_corner <= wide_radius);
    }
}
