// Scene assembly: the shared scene graph all loaders add their meshes to

use crate::kernel_in::BuildingId;
use crate::kernel_out::{Aabb, MeshAttributes};
use crate::materials::Material;

/// Stable identity of a material inside one scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Ground,
    Road,
    RoadMarking,
    RoadArea,
    Walkway,
    Building(BuildingId),
}

impl NodeKind {
    /// Only buildings carry an identity and are pickable
    pub fn building_id(&self) -> Option<BuildingId> {
        match self {
            NodeKind::Building(building_id) => Some(*building_id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub mesh: MeshAttributes,
    pub material: MaterialId,
    pub bounding_box: Aabb,
}

#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    materials: Vec<Material>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn add_node(&mut self, kind: NodeKind, mesh: MeshAttributes, material: MaterialId) -> NodeId {
        let bounding_box = mesh.bounding_box();
        self.nodes.push(SceneNode {
            kind,
            mesh,
            material,
            bounding_box,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Square plane of `size` centered below the campus origin
    pub fn add_ground(&mut self, size: f64, elevation: f64, material: MaterialId) -> NodeId {
        let half = (size / 2.0) as f32;
        let height = elevation as f32;
        let mut mesh = MeshAttributes::new();
        mesh.push_square(
            [-half, height, half],
            [half, height, half],
            [-half, height, -half],
            [half, height, -half],
            [0.0, 1.0],
            1.0,
        );
        self.add_node(NodeKind::Ground, mesh, material)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&NodeKind) -> bool) -> usize {
        self.nodes.iter().filter(|node| predicate(&node.kind)).count()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(|node| node.mesh.triangle_count()).sum()
    }
}
