// Footprints and road curves to 3D meshes: flat caps, flat walls, no bevel.

use glam::DVec3;

use crate::curve::{CatmullRomCurve, CurvePoint};
use crate::error::ExtrudeError;
use crate::footprint::{FIRST_HOLE_INDEX, Footprint, POLYGON_OUTER, signed_area};
use crate::kernel_in::{GeographicCoordinates, GroundPosition, Projector};
use crate::kernel_out::{MeshAttributes, RenderPosition};

///////////////////////////////////////////////////////////////////////////////////////////////////
// SOLIDS /////////////////////////////////////////////////////////////////////////////////////////

// Local methods of GroundPosition, only to be used for meshes!
impl GroundPosition {
    pub fn to_render_position(self, height: f64) -> RenderPosition {
        // Minus north because +north is -z in render space.
        [self.east as f32, height as f32, -self.north as f32]
    }
}

fn curve_to_render_position(point: CurvePoint, elevation: f64) -> RenderPosition {
    [point.x as f32, (elevation + point.z) as f32, -point.y as f32]
}

/// An extruded footprint
#[derive(Clone, Debug, PartialEq)]
pub struct Solid {
    pub mesh: MeshAttributes,
    pub footprint_area: f64,
    pub depth: f64,
}

fn check_depth(depth: f64) -> Result<(), ExtrudeError> {
    if depth.is_finite() && depth > 0.0 {
        Ok(())
    } else {
        Err(ExtrudeError::NonPositiveDepth(depth))
    }
}

#[derive(Default)]
struct ExtrudeMesh {
    attributes: MeshAttributes,
}

impl ExtrudeMesh {
    // Caps. Top faces up (counter-clockwise seen from above), bottom faces down.
    fn push_flat(
        &mut self,
        footprint: &Footprint,
        polygon_index: usize,
        height: f64,
        facing_up: bool,
    ) -> Result<(), ExtrudeError> {
        let (indices, vertices) = footprint.get_triangulate_indices(polygon_index)?;
        let index_offset = self.attributes.next_index();

        for corner in vertices.chunks_exact(2) {
            let position = GroundPosition::new(corner[0], corner[1]);
            self.attributes.push_vertex(
                position.to_render_position(height),
                [corner[0] as f32, corner[1] as f32],
            );
        }

        for triangle in indices.chunks_exact(3) {
            let corner = |index: usize| (vertices[index * 2], vertices[index * 2 + 1]);
            let (a, b, c) = (corner(triangle[0]), corner(triangle[1]), corner(triangle[2]));
            let doubled_area = (b.0 - a.0) * (c.1 - a.1) - (c.0 - a.0) * (b.1 - a.1);
            let is_counter_clockwise = doubled_area > 0.0;
            let [first, second, third] = [triangle[0], triangle[1], triangle[2]]
                .map(|index| index + index_offset);
            if is_counter_clockwise == facing_up {
                self.attributes.push_3_indices([first, second, third]);
            } else {
                self.attributes.push_3_indices([first, third, second]);
            }
        }
        Ok(())
    }

    fn push_walls(&mut self, footprint: &Footprint, polygon_index: usize, base: f64, top: f64) {
        let polygon = &footprint.polygons[polygon_index];
        self.push_wall_shape(&polygon[POLYGON_OUTER], base, top);
        for hole in &polygon[FIRST_HOLE_INDEX..] {
            self.push_wall_shape(hole, base, top);
        }
    }

    // Rings are oriented by Footprint::close, so every wall faces away from the solid.
    fn push_wall_shape(&mut self, ring: &[GroundPosition], base: f64, top: f64) {
        let Some(last) = ring.last() else {
            return;
        };
        let mut last_position = *last;
        let mut walked = 0.0;
        let uv_height = (top - base) as f32;

        for position in ring {
            let length = last_position.distance_to_other(position);
            self.attributes.push_square(
                last_position.to_render_position(base),
                position.to_render_position(base),
                last_position.to_render_position(top),
                position.to_render_position(top),
                [walked as f32, (walked + length) as f32],
                uv_height,
            );
            walked += length;
            last_position = *position;
        }
    }
}

/// Sweeps a footprint from `base` up by `depth`.
/// A polygon of a multi polygon which can't be triangulated is skipped, if none is left it's an error.
pub fn extrude_footprint(footprint: &Footprint, base: f64, depth: f64) -> Result<Solid, ExtrudeError> {
    check_depth(depth)?;
    let mut mesh = ExtrudeMesh::default();
    let mut last_error = ExtrudeError::Triangulation;
    let mut footprint_area = 0.0;

    for polygon_index in 0..footprint.polygons.len() {
        let mut polygon_mesh = ExtrudeMesh::default();
        let caps = polygon_mesh
            .push_flat(footprint, polygon_index, base + depth, true)
            .and_then(|_| polygon_mesh.push_flat(footprint, polygon_index, base, false));
        match caps {
            Ok(()) => {
                polygon_mesh.push_walls(footprint, polygon_index, base, base + depth);
                mesh.attributes.append(&polygon_mesh.attributes);
                footprint_area += footprint.polygons[polygon_index]
                    .iter()
                    .map(|ring| signed_area(ring))
                    .sum::<f64>();
            }
            Err(error) => last_error = error,
        }
    }

    if mesh.attributes.is_empty() {
        return Err(last_error);
    }
    Ok(Solid {
        mesh: mesh.attributes,
        footprint_area,
        depth,
    })
}

/// Projects the outer ring and its holes and sweeps them from the ground up by `depth`.
pub fn extrude(
    projector: &Projector,
    outer: &[GeographicCoordinates],
    holes: &[Vec<GeographicCoordinates>],
    depth: f64,
) -> Result<Solid, ExtrudeError> {
    check_depth(depth)?;
    let footprint = Footprint::new(
        projector.project_ring(outer),
        holes.iter().map(|hole| projector.project_ring(hole)).collect(),
    )?;
    extrude_footprint(&footprint, 0.0, depth)
}

///////////////////////////////////////////////////////////////////////////////////////////////////
// RIBBONS ////////////////////////////////////////////////////////////////////////////////////////

// sampled lengths are not exact
static LENGTH_EPSILON: f64 = 1e-6;

/// Cross-section of a road or a road marking
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RibbonProfile {
    pub width: f64,
    pub steps: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DashPattern {
    pub dash: f64,
    pub gap: f64,
    pub profile: RibbonProfile,
}

/// Flat strip of `profile.width` along the curve between the length fractions `from` and `to`.
pub fn ribbon_between(
    curve: &CatmullRomCurve,
    from: f64,
    to: f64,
    profile: &RibbonProfile,
    elevation: f64,
) -> Result<MeshAttributes, ExtrudeError> {
    check_depth(profile.width)?;
    let steps = profile.steps.max(1);
    let half = profile.width / 2.0;
    let mut attributes = MeshAttributes::new();

    let side_points = |u: f64| {
        let point = curve.point_at(u);
        let tangent = curve.tangent_at(u);
        // horizontal normal, to the left of the direction
        let normal = DVec3::new(-tangent.y, tangent.x, 0.0);
        let left = point + normal * half;
        let right = point - normal * half;
        (
            curve_to_render_position(left, elevation),
            curve_to_render_position(right, elevation),
        )
    };

    let length = curve.length() * (to - from);
    let (mut last_left, mut last_right) = side_points(from);
    for step in 1..=steps {
        let fraction = step as f64 / steps as f64;
        let (left, right) = side_points(from + (to - from) * fraction);
        attributes.push_square(
            last_left,
            last_right,
            left,
            right,
            [0.0, profile.width as f32],
            (length / steps as f64) as f32,
        );
        last_left = left;
        last_right = right;
    }
    Ok(attributes)
}

pub fn ribbon(
    curve: &CatmullRomCurve,
    profile: &RibbonProfile,
    elevation: f64,
) -> Result<MeshAttributes, ExtrudeError> {
    ribbon_between(curve, 0.0, 1.0, profile, elevation)
}

/// Dashed center line: one short ribbon per dash, walking the arc length in dash + gap cycles.
/// Stops when the remaining length can't hold a full dash.
pub fn dashed_centerline(
    curve: &CatmullRomCurve,
    pattern: &DashPattern,
    elevation: f64,
) -> Result<Vec<MeshAttributes>, ExtrudeError> {
    check_depth(pattern.dash)?;
    let cycle = pattern.dash + pattern.gap;
    let length = curve.length();
    if cycle <= 0.0 || length <= 0.0 {
        return Ok(Vec::new());
    }

    let mut dashes = Vec::new();
    let mut start = 0.0;
    // the trailing gap may be cut short, the dash may not
    while start + pattern.dash <= length + LENGTH_EPSILON {
        let end = start + pattern.dash;
        dashes.push(ribbon_between(
            curve,
            start / length,
            (end / length).min(1.0),
            &pattern.profile,
            elevation,
        )?);
        start += cycle;
    }
    Ok(dashes)
}
