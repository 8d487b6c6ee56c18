// outer SHAPE of a building, walkway or road area, with its holes

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use tracing::debug;

use crate::error::ExtrudeError;
use crate::kernel_in::{GroundPosition, GroundPositions, MIN_RING_POINTS};

pub const FIRST_POLYGON: usize = 0;
pub const POLYGON_OUTER: usize = 0;
pub const FIRST_HOLE_INDEX: usize = 1;

// polygons[n][POLYGON_OUTER] is the outer ring, polygons[n][FIRST_HOLE_INDEX..] are its holes
pub type Polygon = Vec<GroundPositions>;
pub type Polygons = Vec<Polygon>;

// i_overlay works on plain [x, y] points
type OverlayShapes = Vec<Vec<Vec<[f64; 2]>>>;

static CLOSING_EPSILON: f64 = 1e-9;
static MIN_AREA: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub struct Footprint {
    pub polygons: Polygons,
}

/// Signed area by the shoelace formula. Positive = counter-clockwise (east right, north up).
pub fn signed_area(ring: &[GroundPosition]) -> f64 {
    let mut sum = 0.0;
    for (index, position) in ring.iter().enumerate() {
        let next = ring[(index + 1) % ring.len()];
        sum += position.east * next.north - next.east * position.north;
    }
    sum / 2.0
}

/// Even-odd ray casting. Points on the border may go either way.
pub fn ring_contains(ring: &[GroundPosition], point: &GroundPosition) -> bool {
    let mut inside = false;
    let mut last = match ring.last() {
        Some(last) => *last,
        None => return false,
    };
    for position in ring {
        if (position.north > point.north) != (last.north > point.north) {
            let crossing_east = position.east
                + (point.north - position.north) / (last.north - position.north)
                    * (last.east - position.east);
            if point.east < crossing_east {
                inside = !inside;
            }
        }
        last = *position;
    }
    inside
}

// The GeoJSON ring is closed: last == first. The extruder wants every corner once.
fn drop_closing_duplicate(ring: &mut GroundPositions) {
    if ring.len() >= 2 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if first.distance_to_other(&last) < CLOSING_EPSILON {
            ring.pop();
        }
    }
}

fn to_overlay(polygons: &Polygons) -> OverlayShapes {
    polygons
        .iter()
        .map(|polygon| {
            polygon
                .iter()
                .map(|ring| ring.iter().map(GroundPosition::as_array).collect())
                .collect()
        })
        .collect()
}

fn from_overlay(shapes: OverlayShapes) -> Polygons {
    shapes
        .into_iter()
        .map(|shape| {
            shape
                .into_iter()
                .map(|contour| contour.into_iter().map(GroundPosition::from).collect())
                .collect()
        })
        .collect()
}

impl Footprint {
    /// Builds a footprint from one outer ring and its holes, already projected.
    /// Holes with less than 3 corners are dropped, a too small outer ring is an error.
    pub fn new(outer: GroundPositions, holes: Vec<GroundPositions>) -> Result<Self, ExtrudeError> {
        let mut polygon = vec![outer];
        polygon.extend(holes);
        let mut footprint = Self {
            polygons: vec![polygon],
        };
        footprint.close()?;
        Ok(footprint)
    }

    /// Normalizes all rings: no closing duplicate, outer counter-clockwise, holes clockwise.
    pub fn close(&mut self) -> Result<(), ExtrudeError> {
        for polygon in &mut self.polygons {
            for ring in polygon.iter_mut() {
                drop_closing_duplicate(ring);
            }
            let outer_len = polygon.first().map_or(0, |outer| outer.len());
            if outer_len < MIN_RING_POINTS {
                return Err(ExtrudeError::TooFewPoints(outer_len, MIN_RING_POINTS));
            }

            let mut index = FIRST_HOLE_INDEX;
            while index < polygon.len() {
                if polygon[index].len() < MIN_RING_POINTS {
                    debug!("hole with {} points dropped", polygon[index].len());
                    polygon.remove(index);
                } else {
                    index += 1;
                }
            }

            for (index, ring) in polygon.iter_mut().enumerate() {
                let is_counter_clockwise = signed_area(ring) > 0.0;
                let wants_counter_clockwise = index == POLYGON_OUTER;
                if is_counter_clockwise != wants_counter_clockwise {
                    ring.reverse();
                }
            }
        }
        Ok(())
    }

    pub fn outer(&self) -> &GroundPositions {
        &self.polygons[FIRST_POLYGON][POLYGON_OUTER]
    }

    /// Area of all polygons, holes subtracted
    pub fn area(&self) -> f64 {
        self.polygons
            .iter()
            .map(|polygon| {
                polygon
                    .iter()
                    .map(|ring| signed_area(ring))
                    .sum::<f64>()
            })
            .sum()
    }

    /// True if every corner of `ring` lies inside one of the outer rings.
    pub fn contains_ring(&self, ring: &[GroundPosition]) -> bool {
        !ring.is_empty()
            && self.polygons.iter().any(|polygon| {
                ring.iter()
                    .all(|position| ring_contains(&polygon[POLYGON_OUTER], position))
            })
    }

    pub fn get_triangulate_indices(
        &self,
        polygon_index: usize,
    ) -> Result<(Vec<usize>, Vec<f64>), ExtrudeError> {
        let mut vertices = Vec::<f64>::new();
        let mut holes_starts = Vec::<usize>::new();

        for position in &self.polygons[polygon_index][POLYGON_OUTER] {
            vertices.push(position.east);
            vertices.push(position.north);
        }

        for hole in &self.polygons[polygon_index][FIRST_HOLE_INDEX..] {
            holes_starts.push(vertices.len() / 2);
            for position in hole {
                vertices.push(position.east);
                vertices.push(position.north);
            }
        }

        let indices = earcutr::earcut(&vertices, &holes_starts, 2)
            .map_err(|_| ExtrudeError::Triangulation)?;
        if indices.is_empty() {
            return Err(ExtrudeError::Triangulation);
        }

        Ok((indices, vertices))
    }

    // subtracting holes which are not part of the own GeoJSON polygon (walkway holes)
    pub fn subtract(&mut self, hole_polygons: &Polygons) -> Result<(), ExtrudeError> {
        if hole_polygons.is_empty() {
            return Ok(());
        }
        let remaining = to_overlay(&self.polygons).overlay(
            &to_overlay(hole_polygons),
            OverlayRule::Difference,
            FillRule::EvenOdd,
        );

        let mut polygons = from_overlay(remaining);
        // compensate slivers of the subtraction
        polygons.retain(|polygon| {
            !polygon.is_empty() && signed_area(&polygon[POLYGON_OUTER]).abs() > MIN_AREA
        });
        if polygons.is_empty() {
            return Err(ExtrudeError::NothingLeft);
        }
        self.polygons = polygons;
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[[f64; 2]]) -> GroundPositions {
        points.iter().map(|p| GroundPosition::from(*p)).collect()
    }

    fn square(min: f64, max: f64) -> GroundPositions {
        ring(&[[min, min], [min, max], [max, max], [max, min], [min, min]])
    }

    #[test]
    fn closing_duplicate_is_dropped_and_outer_turned_counter_clockwise() {
        // the test square is clockwise
        let footprint = Footprint::new(square(0., 10.), vec![]).unwrap();
        assert_eq!(footprint.outer().len(), 4);
        assert!(signed_area(footprint.outer()) > 0.0);
        assert!((footprint.area() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn holes_reduce_the_area() {
        let footprint = Footprint::new(square(0., 10.), vec![square(2., 4.)]).unwrap();
        assert!((footprint.area() - 96.0).abs() < 1e-9);
        assert!(signed_area(&footprint.polygons[0][1]) < 0.0);
        let (indices, vertices) = footprint.get_triangulate_indices(0).unwrap();
        assert_eq!(vertices.len(), 16);
        // a quad with a quad hole needs 8 triangles
        assert_eq!(indices.len(), 8 * 3);
    }

    #[test]
    fn degenerate_rings() {
        assert_eq!(
            Footprint::new(ring(&[[0., 0.], [1., 1.], [0., 0.]]), vec![]),
            Err(ExtrudeError::TooFewPoints(2, 3))
        );
        // a tiny hole is dropped, not fatal
        let footprint = Footprint::new(square(0., 10.), vec![ring(&[[1., 1.], [2., 2.]])]).unwrap();
        assert_eq!(footprint.polygons[0].len(), 1);
    }

    #[test]
    fn nested_rings_are_detected() {
        let footprint = Footprint::new(square(0., 10.), vec![]).unwrap();
        assert!(footprint.contains_ring(&square(2., 4.)));
        assert!(!footprint.contains_ring(&square(8., 12.)));
        assert!(!footprint.contains_ring(&square(20., 30.)));
        assert!(!footprint.contains_ring(&[]));
    }

    #[test]
    fn subtracting_a_hole_keeps_the_rest() {
        let mut footprint = Footprint::new(square(0., 10.), vec![]).unwrap();
        let hole = Footprint::new(square(2., 4.), vec![]).unwrap();
        footprint.subtract(&hole.polygons).unwrap();
        assert!((footprint.area() - 96.0).abs() < 1e-6);

        let mut small = Footprint::new(square(3., 4.), vec![]).unwrap();
        let cover = Footprint::new(square(0., 10.), vec![]).unwrap();
        assert_eq!(small.subtract(&cover.polygons), Err(ExtrudeError::NothingLeft));
    }
}
