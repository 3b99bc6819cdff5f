//! Flattens extracted triangles into render-ready buffers.

use bevy_math::Vec3;
use bevy_mesh::{Indices, Mesh, PrimitiveTopology};
use bevy_render::render_asset::RenderAssetUsages;

/// Three vertex positions in the winding the extractor emits.
///
/// Under that winding, `(b - a).cross(c - a)` points out of the solid, towards lower density.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle(pub [Vec3; 3]);

impl Triangle {
    /// The vertices in emission order.
    #[inline]
    pub const fn vertices(&self) -> &[Vec3; 3] {
        &self.0
    }

    /// The unnormalized face normal.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        let [a, b, c] = self.0;
        (b - a).cross(c - a)
    }

    /// The average of the vertices.
    #[inline]
    pub fn centroid(&self) -> Vec3 {
        let [a, b, c] = self.0;
        (a + b + c) / 3.0
    }
}

/// The geometry of one chunk.
///
/// No vertices are shared: triangle `i` owns vertices `3i..3i + 3`, and the indices are simply `0..3n`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkMesh {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
}

impl ChunkMesh {
    /// Assembles a mesh from `triangles`.
    pub fn from_triangles(triangles: &[Triangle]) -> Self {
        let mut mesh = Self::default();
        mesh.rebuild(triangles);
        mesh
    }

    /// Replaces the contents of this mesh with `triangles`, reusing its buffers.
    pub fn rebuild(&mut self, triangles: &[Triangle]) {
        self.clear();
        self.vertices.reserve(triangles.len() * 3);
        self.indices.reserve(triangles.len() * 3);
        for triangle in triangles {
            for &vertex in triangle.vertices() {
                self.indices.push(self.vertices.len() as u32);
                self.vertices.push(vertex);
            }
        }
    }

    /// Removes all geometry, keeping allocations.
    #[inline]
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// The vertex positions.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// The triangle-list indices into [`Self::vertices`].
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// How many triangles this mesh holds.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether there is no geometry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates the triangles back out of the buffers.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            Triangle([
                self.vertices[tri[0] as usize],
                self.vertices[tri[1] as usize],
                self.vertices[tri[2] as usize],
            ])
        })
    }

    /// Hands this geometry to `target`.
    pub fn write_to(&self, target: &mut impl RenderTarget) {
        target.clear();
        target.upload(&self.vertices, &self.indices);
    }

    /// Builds a fresh render mesh with positions, indices, and normals.
    pub fn to_render_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        self.write_to(&mut mesh);
        mesh
    }
}

/// Something outside this crate that displays a chunk's geometry.
pub trait RenderTarget {
    /// Drops any previously uploaded geometry.
    fn clear(&mut self);
    /// Replaces the geometry and recomputes whatever is derived from it, like normals.
    fn upload(&mut self, vertices: &[Vec3], indices: &[u32]);
}

/// Normals are only computed for [`PrimitiveTopology::TriangleList`] meshes.
/// Other topologies receive positions and indices only.

impl RenderTarget for Mesh {
    fn clear(&mut self) {
        self.remove_attribute(Mesh::ATTRIBUTE_POSITION);
        self.remove_attribute(Mesh::ATTRIBUTE_NORMAL);
        self.remove_indices();
    }

    fn upload(&mut self, vertices: &[Vec3], indices: &[u32]) {
        let positions: Vec<[f32; 3]> = vertices.iter().map(Vec3::to_array).collect();
        self.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        self.insert_indices(Indices::U32(indices.to_vec()));
        if !indices.is_empty() && self.primitive_topology() == PrimitiveTopology::TriangleList {
            // Nothing is shared, so the smooth normals are the face normals.
            self.compute_normals();
        }
    }
}
