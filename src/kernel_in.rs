// Internal Interface of the crate/lib between the GeoJSON input and the extruder:
// geographic coordinates in, local planar positions out.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Identity of one building: the 1-based index of its source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub u32);

impl BuildingId {
    /// Key used by the name and texture side tables.
    pub fn as_key(&self) -> String {
        self.0.to_string()
    }
}

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeographicCoordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeographicCoordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// GeoJSON order: `[lon, lat]`. Extra values like an altitude are ignored.
    pub fn from_lon_lat(pair: &[f64]) -> Option<Self> {
        match pair {
            [longitude, latitude, ..] if longitude.is_finite() && latitude.is_finite() => {
                Some(Self::new(*longitude, *latitude))
            }
            _ => None,
        }
    }
}

// A position on the local plane. east = x, north = y
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPosition {
    pub east: f64,
    pub north: f64,
}

pub type GroundPositions = Vec<GroundPosition>;

impl Add for GroundPosition {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            east: self.east + other.east,
            north: self.north + other.north,
        }
    }
}

impl Sub for GroundPosition {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            east: self.east - other.east,
            north: self.north - other.north,
        }
    }
}

impl GroundPosition {
    pub const ZERO: Self = Self {
        east: 0.0,
        north: 0.0,
    };

    pub fn new(east: f64, north: f64) -> Self {
        Self { east, north }
    }

    pub fn distance_to_other(&self, other: &GroundPosition) -> f64 {
        let a = self.north - other.north;
        let b = self.east - other.east;
        f64::sqrt(a * a + b * b)
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.east, self.north]
    }
}

impl From<[f64; 2]> for GroundPosition {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl std::fmt::Display for GroundPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.east, self.north)
    }
}

/// Flat local-tangent-plane projection: `x = (lon - lon0) * scale`, `y = (lat - lat0) * scale`.
///
/// It is affine and pure, so shared vertices and containment survive the projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projector {
    pub origin: GeographicCoordinates,
    pub scale: f64,
}

impl Default for Projector {
    fn default() -> Self {
        Self {
            origin: GeographicCoordinates::new(20.96, 41.985),
            scale: 100_000.0,
        }
    }
}

impl Projector {
    pub fn new(origin: GeographicCoordinates, scale: f64) -> Self {
        Self { origin, scale }
    }

    pub fn project(&self, coordinates: &GeographicCoordinates) -> GroundPosition {
        GroundPosition {
            east: (coordinates.longitude - self.origin.longitude) * self.scale,
            north: (coordinates.latitude - self.origin.latitude) * self.scale,
        }
    }

    pub fn project_ring(&self, ring: &[GeographicCoordinates]) -> GroundPositions {
        ring.iter().map(|c| self.project(c)).collect()
    }
}

// Minimal vertex counts per geometry type
pub const MIN_LINE_POINTS: usize = 2;
pub const MIN_RING_POINTS: usize = 3;

/// The geographic area of interest. Features with any vertex outside are dropped before projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self {
            min_lon: 20.95853286124489,
            max_lon: 20.96584573595831,
            min_lat: 41.98350594518007,
            max_lat: 41.994342701395055,
        }
    }
}

impl GeoBounds {
    pub fn contains(&self, coordinates: &GeographicCoordinates) -> bool {
        coordinates.longitude >= self.min_lon
            && coordinates.longitude <= self.max_lon
            && coordinates.latitude >= self.min_lat
            && coordinates.latitude <= self.max_lat
    }

    fn all_inside(&self, points: &[GeographicCoordinates], min_points: usize) -> bool {
        points.len() >= min_points && points.iter().all(|c| self.contains(c))
    }

    /// A polygon ring passes if it has at least 3 vertices and all are inside.
    pub fn in_bounds(&self, ring: &[GeographicCoordinates]) -> bool {
        self.all_inside(ring, MIN_RING_POINTS)
    }

    /// Same for a line, which needs only 2 vertices.
    pub fn line_in_bounds(&self, line: &[GeographicCoordinates]) -> bool {
        self.all_inside(line, MIN_LINE_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[[f64; 2]]) -> Vec<GeographicCoordinates> {
        points
            .iter()
            .map(|p| GeographicCoordinates::new(p[0], p[1]))
            .collect()
    }

    #[test]
    fn projection_is_affine_and_repeatable() {
        let projector = Projector::new(GeographicCoordinates::new(20.96, 41.985), 100_000.0);
        let point = GeographicCoordinates::new(20.961, 41.986);
        let first = projector.project(&point);
        let second = projector.project(&point);
        assert_eq!(first, second);
        assert!((first.east - 100.0).abs() < 1e-6);
        assert!((first.north - 100.0).abs() < 1e-6);
        assert_eq!(
            projector.project(&projector.origin),
            GroundPosition::ZERO
        );
    }

    #[test]
    fn projected_ring_keeps_vertex_order() {
        let projector = Projector::new(GeographicCoordinates::new(0.0, 0.0), 2.0);
        let raw = ring(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]);
        let projected = projector.project_ring(&raw);
        for (raw, projected) in raw.iter().zip(&projected) {
            assert_eq!(projected.east, raw.longitude * 2.0);
            assert_eq!(projected.north, raw.latitude * 2.0);
        }
    }

    #[test]
    fn bounds_accept_inside_reject_outside() {
        let bounds = GeoBounds {
            min_lon: 0.0,
            max_lon: 10.0,
            min_lat: 0.0,
            max_lat: 10.0,
        };
        let inside = ring(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]);
        assert!(bounds.in_bounds(&inside));

        let one_out = ring(&[[0.0, 0.0], [0.0, 10.0], [10.5, 10.0], [10.0, 0.0]]);
        assert!(!bounds.in_bounds(&one_out));
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        let bounds = GeoBounds {
            min_lon: 0.0,
            max_lon: 10.0,
            min_lat: 0.0,
            max_lat: 10.0,
        };
        assert!(!bounds.in_bounds(&[]));
        assert!(!bounds.in_bounds(&ring(&[[1.0, 1.0], [2.0, 2.0]])));
        assert!(bounds.line_in_bounds(&ring(&[[1.0, 1.0], [2.0, 2.0]])));
        assert!(!bounds.line_in_bounds(&ring(&[[1.0, 1.0]])));
    }

    #[test]
    fn lon_lat_pairs_need_two_finite_values() {
        assert_eq!(
            GeographicCoordinates::from_lon_lat(&[1.0, 2.0, 300.0]),
            Some(GeographicCoordinates::new(1.0, 2.0))
        );
        assert_eq!(GeographicCoordinates::from_lon_lat(&[1.0]), None);
        assert_eq!(GeographicCoordinates::from_lon_lat(&[f64::NAN, 1.0]), None);
    }
}
