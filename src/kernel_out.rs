// Internal Interface of the crate/lib between the extruder and a renderer or picker

// The usual format, a GPU wants its vertex position. At least Bevy does.
pub type RenderPosition = [f32; 3];
pub type RenderUv = [f32; 2];

// Internal color type. It's just luck, it is the same as needed for the gpu-renderer Bevy ;-)
pub type RenderColor = [f32; 4];

/// Axis aligned box in render space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: RenderPosition,
    pub max: RenderPosition,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    pub fn include(&mut self, position: &RenderPosition) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(position[axis]);
            self.max[axis] = self.max[axis].max(position[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }
}

// Mesh render attributes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAttributes {
    pub indices_to_vertices: Vec<u32>,
    pub vertices_positions: Vec<RenderPosition>, // corners are NOT reused, to get hard edges
    pub vertices_uvs: Vec<RenderUv>,
}

impl MeshAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices_to_vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices_to_vertices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [RenderPosition; 3]> + '_ {
        self.indices_to_vertices.chunks_exact(3).map(|triangle| {
            [
                self.vertices_positions[triangle[0] as usize],
                self.vertices_positions[triangle[1] as usize],
                self.vertices_positions[triangle[2] as usize],
            ]
        })
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for position in &self.vertices_positions {
            aabb.include(position);
        }
        aabb
    }

    /// Index of the next pushed vertex
    pub fn next_index(&self) -> usize {
        self.vertices_positions.len()
    }

    pub fn push_vertex(&mut self, position: RenderPosition, uv: RenderUv) {
        self.vertices_positions.push(position);
        self.vertices_uvs.push(uv);
    }

    pub fn push_3_indices(&mut self, indices: [usize; 3]) {
        self.indices_to_vertices.push(indices[0] as u32);
        self.indices_to_vertices.push(indices[1] as u32);
        self.indices_to_vertices.push(indices[2] as u32);
    }

    pub fn push_square(
        &mut self,
        down_left: RenderPosition,
        down_right: RenderPosition,
        up_left: RenderPosition,
        up_right: RenderPosition,
        uv_width: [f32; 2],
        uv_height: f32,
    ) {
        // First index of the coming 4 positions
        let index = self.next_index();

        self.push_vertex(down_left, [uv_width[0], 0.0]); //   +0     2---3
        self.push_vertex(down_right, [uv_width[1], 0.0]); //  +1     |   |
        self.push_vertex(up_left, [uv_width[0], uv_height]); //   +2     0---1
        self.push_vertex(up_right, [uv_width[1], uv_height]); //  +3

        // Push first and second triangle
        self.push_3_indices([index /*....*/, index + 1, index + 2]);
        self.push_3_indices([index /*.*/+ 1, index + 3, index + 2]);
    }

    pub fn append(&mut self, other: &MeshAttributes) {
        let offset = self.vertices_positions.len() as u32;
        self.vertices_positions
            .extend_from_slice(&other.vertices_positions);
        self.vertices_uvs.extend_from_slice(&other.vertices_uvs);
        self.indices_to_vertices
            .extend(other.indices_to_vertices.iter().map(|index| index + offset));
    }
}
