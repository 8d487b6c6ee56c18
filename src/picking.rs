// Pick & highlight: screen point -> ray -> nearest building -> emissive tint + info

use glam::{DMat3, DMat4, DVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::kernel_in::BuildingId;
use crate::kernel_out::{Aabb, RenderColor, RenderPosition};
use crate::registry::{BuildingInfo, BuildingRegistry};
use crate::scene::{MaterialId, NodeId, SceneGraph};

fn widen(position: RenderPosition) -> DVec3 {
    Vec3::from_array(position).as_dvec3()
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// None for a zero direction
    pub fn new(origin: DVec3, direction: DVec3) -> Option<Self> {
        Some(Self {
            origin,
            direction: direction.try_normalize()?,
        })
    }

    pub fn at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }

    /// Slab test, entry distance (0 if the origin is inside)
    pub fn hit_aabb(&self, aabb: &Aabb) -> Option<f64> {
        if aabb.is_empty() {
            return None;
        }
        let mut t_min = 0.0_f64;
        let mut t_max = f64::MAX;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let direction = self.direction[axis];
            let (min, max) = (aabb.min[axis] as f64, aabb.max[axis] as f64);

            if direction.abs() < 1e-12 {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let inverse = 1.0 / direction;
            let mut t1 = (min - origin) * inverse;
            let mut t2 = (max - origin) * inverse;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_max < t_min {
                return None;
            }
        }
        Some(t_min)
    }

    /// Möller–Trumbore, both sides
    pub fn hit_triangle(&self, triangle: &[RenderPosition; 3]) -> Option<f64> {
        let [a, b, c] = triangle.map(widen);
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let determinant = edge1.dot(p);
        if determinant.abs() < 1e-12 {
            return None;
        }
        let inverse = 1.0 / determinant;
        let s = self.origin - a;
        let u = s.dot(p) * inverse;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inverse;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let distance = edge2.dot(q) * inverse;
        (distance > 1e-9).then_some(distance)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub building_id: BuildingId,
    pub distance: f64,
    pub point: DVec3,
}

/// Nearest building hit along the ray. Ground, roads and walkways are not pickable.
/// On equal distance the lower node index wins.
pub fn pick_ray(scene: &SceneGraph, ray: &Ray) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;

    for (index, node) in scene.nodes().iter().enumerate() {
        let Some(building_id) = node.kind.building_id() else {
            continue;
        };
        let Some(entry) = ray.hit_aabb(&node.bounding_box) else {
            continue;
        };
        if best.is_some_and(|best| entry > best.distance) {
            continue;
        }

        let nearest = node
            .mesh
            .triangles()
            .filter_map(|triangle| ray.hit_triangle(&triangle))
            .min_by(f64::total_cmp);
        let Some(distance) = nearest else {
            continue;
        };

        // nodes come in index order, so only a strictly nearer hit replaces
        if best.is_none_or(|best| distance < best.distance) {
            best = Some(PickHit {
                node: NodeId(index),
                building_id,
                distance,
                point: ray.at(distance),
            });
        }
    }
    best
}

/// Perspective camera in render space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    pub fov_y_degrees: f64,
    pub aspect: f64,
}

impl Default for Camera {
    // Overview of the campus, looking straight down
    fn default() -> Self {
        Self {
            position: DVec3::new(80.85, 339.77, -197.06),
            target: DVec3::new(80.85, 0.0, -197.06),
            up: DVec3::Y,
            fov_y_degrees: 75.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    /// Right, up and backward axes of the view
    pub fn view_axes(&self) -> Option<(DVec3, DVec3, DVec3)> {
        let forward = (self.target - self.position).try_normalize()?;
        // looking along `up`: north (-z) is screen up, or +y when looking along z
        let up = [self.up, DVec3::NEG_Z, DVec3::Y]
            .into_iter()
            .find(|up| forward.cross(*up).length_squared() > 1e-20)?;
        // the view matrix rotates world into view, its transpose back
        let view = DMat3::from_mat4(DMat4::look_to_rh(self.position, forward, up)).transpose();
        Some((view.x_axis, view.y_axis, view.z_axis))
    }

    /// Ray through pixel (x, y) of a `width` x `height` viewport, y down
    pub fn screen_ray(&self, x: f64, y: f64, width: f64, height: f64) -> Option<Ray> {
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        let (right, up, backward) = self.view_axes()?;
        let ndc_x = x / width * 2.0 - 1.0;
        let ndc_y = -(y / height * 2.0 - 1.0);
        let half_height = (self.fov_y_degrees.to_radians() / 2.0).tan();
        let half_width = half_height * self.aspect;

        let direction = -backward + right * (ndc_x * half_width) + up * (ndc_y * half_height);
        Ray::new(self.position, direction)
    }
}

/// Consumer of the emitted highlight state
pub trait InfoDisplay {
    fn show(&mut self, info: Option<&BuildingInfo>);
}

/// Collects every emitted state, for tests and the command line
#[derive(Debug, Default)]
pub struct CollectedInfo {
    pub emitted: Vec<Option<BuildingInfo>>,
}

impl InfoDisplay for CollectedInfo {
    fn show(&mut self, info: Option<&BuildingInfo>) {
        self.emitted.push(info.cloned());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightState {
    Idle,
    Highlighted(BuildingId),
}

pub struct PickController {
    state: HighlightState,
    highlight_emissive: RenderColor,
    // captured before the first highlight, never overwritten
    original_emissive: HashMap<MaterialId, RenderColor>,
}

impl PickController {
    pub fn new(highlight_emissive: RenderColor) -> Self {
        Self {
            state: HighlightState::Idle,
            highlight_emissive,
            original_emissive: HashMap::new(),
        }
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn original_emissive(&self, material: MaterialId) -> Option<RenderColor> {
        self.original_emissive.get(&material).copied()
    }

    /// Resolves a click and updates highlight and display. Returns the new state.
    pub fn click(
        &mut self,
        ray: Option<&Ray>,
        scene: &mut SceneGraph,
        registry: &BuildingRegistry,
        display: &mut dyn InfoDisplay,
    ) -> HighlightState {
        let hit = ray.and_then(|ray| pick_ray(scene, ray));
        match hit {
            Some(hit) => self.select(hit.building_id, scene, registry, display),
            None => self.clear(scene, registry, display),
        }
    }

    pub fn select(
        &mut self,
        building_id: BuildingId,
        scene: &mut SceneGraph,
        registry: &BuildingRegistry,
        display: &mut dyn InfoDisplay,
    ) -> HighlightState {
        let Some(record) = registry.get(building_id) else {
            return self.clear(scene, registry, display);
        };
        if self.state != HighlightState::Highlighted(building_id) {
            self.restore(scene, registry);
            let material_id = record.material;
            if let Some(material) = scene.material_mut(material_id) {
                self.original_emissive
                    .entry(material_id)
                    .or_insert(material.emissive);
                material.emissive = self.highlight_emissive;
            }
            debug!("highlight {building_id}");
            self.state = HighlightState::Highlighted(building_id);
        }
        display.show(registry.info(building_id, scene).as_ref());
        self.state
    }

    pub fn clear(
        &mut self,
        scene: &mut SceneGraph,
        registry: &BuildingRegistry,
        display: &mut dyn InfoDisplay,
    ) -> HighlightState {
        self.restore(scene, registry);
        self.state = HighlightState::Idle;
        display.show(None);
        self.state
    }

    fn restore(&mut self, scene: &mut SceneGraph, registry: &BuildingRegistry) {
        let HighlightState::Highlighted(building_id) = self.state else {
            return;
        };
        let Some(record) = registry.get(building_id) else {
            return;
        };
        if let (Some(material), Some(original)) = (
            scene.material_mut(record.material),
            self.original_emissive.get(&record.material),
        ) {
            material.emissive = *original;
        }
        debug!("restore {building_id}");
    }
}
