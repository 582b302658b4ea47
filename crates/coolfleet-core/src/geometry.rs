//! Geodesic helpers for geofences.
//!
//! Circles are approximated as regular polygons whose vertices sit at a fixed
//! haversine distance from the center. Membership treats the boundary as
//! inside, so a cooler parked exactly on the fence line is not a breach.

use geo::{
    Closest, ClosestPoint, Coord, HaversineDestination, HaversineDistance, Intersects, LineString,
    Point, Polygon,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of boundary segments used for circular geofences.
pub const CIRCLE_STEPS: usize = 64;

/// A `[longitude, latitude]` pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Finite and inside the valid longitude/latitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(value: LngLat) -> Self {
        [value.lng, value.lat]
    }
}

impl From<LngLat> for Point<f64> {
    fn from(value: LngLat) -> Self {
        Point::new(value.lng, value.lat)
    }
}

impl From<Coord<f64>> for LngLat {
    fn from(value: Coord<f64>) -> Self {
        Self {
            lng: value.x,
            lat: value.y,
        }
    }
}

impl From<Point<f64>> for LngLat {
    fn from(value: Point<f64>) -> Self {
        value.0.into()
    }
}

impl std::fmt::Display for LngLat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.6}, {:.6}]", self.lng, self.lat)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("invalid coordinate {0}")]
    InvalidCoordinate(LngLat),

    #[error("radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("a circle needs at least 3 segments, got {0}")]
    TooFewSteps(usize),

    #[error("invalid polygon ring: {0}")]
    InvalidRing(String),
}

/// Build a closed polygon approximating a circle of `radius_meters` around
/// `center`.
///
/// The ring holds `steps` distinct vertices followed by a copy of the first,
/// wound counter-clockwise starting due north.
///
/// # Errors
///
/// Returns [`GeometryError`] for an out-of-range center, a non-positive or
/// non-finite radius, or fewer than three segments.
pub fn circle_polygon(
    center: LngLat,
    radius_meters: f64,
    steps: usize,
) -> Result<Polygon<f64>, GeometryError> {
    if !center.is_valid() {
        return Err(GeometryError::InvalidCoordinate(center));
    }
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GeometryError::InvalidRadius(radius_meters));
    }
    if steps < 3 {
        return Err(GeometryError::TooFewSteps(steps));
    }

    let origin = Point::from(center);
    // steps is a small segment count; no precision is lost.
    #[allow(clippy::cast_precision_loss)]
    let step_degrees = -360.0 / steps as f64;

    let mut coords: Vec<Coord<f64>> = (0..steps)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let bearing = i as f64 * step_degrees;
            origin.haversine_destination(bearing, radius_meters).0
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }

    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Build a polygon from an operator-supplied ring, closing it if needed.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidRing`] when the ring fails [`validate_ring`].
pub fn polygon_from_ring(ring: &[LngLat]) -> Result<Polygon<f64>, GeometryError> {
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|p| Coord { x: p.lng, y: p.lat })
        .collect();
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    let polygon = Polygon::new(LineString::new(coords), vec![]);
    validate_ring(&polygon)?;
    Ok(polygon)
}

/// Check that the exterior ring is closed, has at least four positions and
/// only valid coordinates.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidRing`] describing the first violation.
pub fn validate_ring(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    let ring = &polygon.exterior().0;
    if ring.len() < 4 {
        return Err(GeometryError::InvalidRing(format!(
            "ring has {} positions; at least 4 required",
            ring.len()
        )));
    }
    if let Some(bad) = ring
        .iter()
        .map(|c| LngLat::from(*c))
        .find(|p| !p.is_valid())
    {
        return Err(GeometryError::InvalidRing(format!(
            "ring contains invalid coordinate {bad}"
        )));
    }
    if ring.first() != ring.last() {
        return Err(GeometryError::InvalidRing("ring is not closed".to_string()));
    }
    Ok(())
}

/// Point-in-polygon membership. Positions on the boundary count as inside.
#[must_use]
pub fn contains(polygon: &Polygon<f64>, point: LngLat) -> bool {
    polygon.intersects(&Point::from(point))
}

/// Haversine distance in meters.
#[must_use]
pub fn distance_meters(a: LngLat, b: LngLat) -> f64 {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// Distance from `point` to the nearest position on the exterior ring, or
/// `0.0` when the point is inside. `None` for a degenerate ring.
#[must_use]
pub fn distance_outside_meters(polygon: &Polygon<f64>, point: LngLat) -> Option<f64> {
    if contains(polygon, point) {
        return Some(0.0);
    }
    let p = Point::from(point);
    match polygon.exterior().closest_point(&p) {
        Closest::Intersection(closest) | Closest::SinglePoint(closest) => {
            Some(p.haversine_distance(&closest))
        }
        Closest::Indeterminate => None,
    }
}

/// Ring positions of the exterior, closing position included.
#[must_use]
pub fn ring_positions(polygon: &Polygon<f64>) -> Vec<LngLat> {
    polygon.exterior().0.iter().map(|c| LngLat::from(*c)).collect()
}

/// Serde adapter storing a polygon as a GeoJSON geometry object.
pub mod geojson_polygon {
    use geo::Polygon;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(polygon: &Polygon<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        geojson::Geometry::new(geojson::Value::from(polygon)).serialize(serializer)
    }

    /// # Errors
    ///
    /// Fails when the geometry is not a GeoJSON `Polygon`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Polygon<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Polygon::<f64>::try_from(geometry.value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOHANNESBURG: LngLat = LngLat::new(28.0473, -26.2041);

    #[test]
    fn circle_has_requested_vertex_count_and_is_closed() {
        let polygon = circle_polygon(JOHANNESBURG, 500.0, CIRCLE_STEPS).unwrap();
        let ring = &polygon.exterior().0;
        assert_eq!(ring.len(), CIRCLE_STEPS + 1);
        assert_eq!(ring.first(), ring.last());
        assert!(validate_ring(&polygon).is_ok());
    }

    #[test]
    fn circle_starts_north_and_winds_counter_clockwise() {
        use geo::Winding;

        let polygon = circle_polygon(JOHANNESBURG, 500.0, CIRCLE_STEPS).unwrap();
        let ring = ring_positions(&polygon);
        assert!((ring[0].lng - JOHANNESBURG.lng).abs() < 1e-9);
        assert!(ring[0].lat > JOHANNESBURG.lat);
        assert!(ring[1].lng < JOHANNESBURG.lng, "second vertex should lie west of north");
        assert!(polygon.exterior().is_ccw());
    }

    #[test]
    fn circle_vertices_sit_at_radius() {
        for radius in [50.0, 300.0, 500.0, 12_000.0] {
            let polygon = circle_polygon(JOHANNESBURG, radius, CIRCLE_STEPS).unwrap();
            for vertex in ring_positions(&polygon) {
                let d = distance_meters(JOHANNESBURG, vertex);
                assert!(
                    (d - radius).abs() < radius * 1e-6,
                    "vertex {vertex} is {d}m from center, expected {radius}m"
                );
            }
        }
    }

    #[test]
    fn circle_rejects_non_positive_radius() {
        assert_eq!(
            circle_polygon(JOHANNESBURG, 0.0, CIRCLE_STEPS),
            Err(GeometryError::InvalidRadius(0.0))
        );
        assert!(matches!(
            circle_polygon(JOHANNESBURG, -5.0, CIRCLE_STEPS),
            Err(GeometryError::InvalidRadius(_))
        ));
        assert!(matches!(
            circle_polygon(JOHANNESBURG, f64::NAN, CIRCLE_STEPS),
            Err(GeometryError::InvalidRadius(_))
        ));
    }

    #[test]
    fn circle_rejects_bad_center_and_steps() {
        assert!(matches!(
            circle_polygon(LngLat::new(200.0, 0.0), 100.0, CIRCLE_STEPS),
            Err(GeometryError::InvalidCoordinate(_))
        ));
        assert_eq!(
            circle_polygon(JOHANNESBURG, 100.0, 2),
            Err(GeometryError::TooFewSteps(2))
        );
    }

    #[test]
    fn contains_center_and_not_far_point() {
        let polygon = circle_polygon(JOHANNESBURG, 300.0, CIRCLE_STEPS).unwrap();
        assert!(contains(&polygon, JOHANNESBURG));
        // Pretoria is ~50 km away.
        assert!(!contains(&polygon, LngLat::new(28.1881, -25.7479)));
    }

    #[test]
    fn contains_counts_boundary_vertex_as_inside() {
        let polygon = circle_polygon(JOHANNESBURG, 300.0, CIRCLE_STEPS).unwrap();
        let vertex = ring_positions(&polygon)[10];
        assert!(contains(&polygon, vertex));
    }

    #[test]
    fn distance_outside_is_zero_inside_and_positive_outside() {
        let polygon = circle_polygon(JOHANNESBURG, 1_000.0, CIRCLE_STEPS).unwrap();
        assert_eq!(distance_outside_meters(&polygon, JOHANNESBURG), Some(0.0));

        // ~2 km due north of the center, so ~1 km outside the fence.
        let north = LngLat::new(28.0473, -26.2041 + 2_000.0 / 111_195.0);
        let outside = distance_outside_meters(&polygon, north).unwrap();
        assert!((outside - 1_000.0).abs() < 25.0, "got {outside}");
    }

    #[test]
    fn polygon_from_ring_closes_open_ring() {
        let ring = [
            LngLat::new(0.0, 0.0),
            LngLat::new(1.0, 0.0),
            LngLat::new(1.0, 1.0),
        ];
        let polygon = polygon_from_ring(&ring).unwrap();
        assert_eq!(polygon.exterior().0.len(), 4);
    }

    #[test]
    fn polygon_from_ring_rejects_degenerate_ring() {
        let ring = [LngLat::new(0.0, 0.0), LngLat::new(1.0, 0.0)];
        assert!(matches!(
            polygon_from_ring(&ring),
            Err(GeometryError::InvalidRing(_))
        ));
    }

    #[test]
    fn lnglat_serializes_as_pair() {
        let json = serde_json::to_string(&JOHANNESBURG).unwrap();
        assert_eq!(json, "[28.0473,-26.2041]");
        let back: LngLat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JOHANNESBURG);
    }

    #[test]
    fn lnglat_validity() {
        assert!(JOHANNESBURG.is_valid());
        assert!(!LngLat::new(f64::NAN, 0.0).is_valid());
        assert!(!LngLat::new(0.0, 91.0).is_valid());
        assert!(!LngLat::new(-181.0, 0.0).is_valid());
    }
}
