//! Contains the chunks that own generated geometry.

use core::fmt::{Display, Formatter};

use bevy_math::{IVec3, Vec3, bounding::Aabb3d};

use crate::mesh::ChunkMesh;

/// The integer grid position of a chunk.
#[repr(transparent)]
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct ChunkCoord(pub IVec3);

impl ChunkCoord {
    /// Constructs a coordinate from its components.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }
}

impl Display for ChunkCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "Chunk ({}, {}, {})", self.0.x, self.0.y, self.0.z)
    }
}

impl From<IVec3> for ChunkCoord {
    #[inline]
    fn from(value: IVec3) -> Self {
        Self(value)
    }
}

/// Identifies a chunk allocation for its whole life, across any number of reassignments.
#[repr(transparent)]
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct ChunkId(u32);

impl ChunkId {
    pub(crate) const FIRST: Self = Self(0);

    /// Makes the id following this one.
    #[inline]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw id.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Where a chunk currently lives.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Membership {
    /// In use at its coordinate.
    Active,
    /// Waiting in the pool to be reassigned. Its mesh is stale.
    Pooled,
}

/// A cubic region of the world and the mesh generated for it.
///
/// Chunks are only ever created, moved, and rebuilt by the [`ChunkManager`](crate::manager::ChunkManager).
#[derive(Debug)]
pub struct Chunk {
    id: ChunkId,
    coord: ChunkCoord,
    mesh: ChunkMesh,
    membership: Membership,
    /// Counts full mesh rebuilds, so callers can tell when to re-upload.
    generation: u64,
}

impl Chunk {
    pub(crate) fn new(id: ChunkId, coord: ChunkCoord) -> Self {
        Self {
            id,
            coord,
            mesh: ChunkMesh::default(),
            membership: Membership::Active,
            generation: 0,
        }
    }

    /// The allocation this chunk came from.
    #[inline]
    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// The grid position this chunk covers.
    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The most recently generated mesh.
    #[inline]
    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    /// Whether this chunk is in use or pooled.
    #[inline]
    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// How many times the mesh has been rebuilt.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Moves this chunk to `coord`, discarding its old geometry.
    pub(crate) fn reassign(&mut self, coord: ChunkCoord) {
        self.coord = coord;
        self.mesh.clear();
        self.membership = Membership::Active;
    }

    pub(crate) fn set_pooled(&mut self) {
        self.membership = Membership::Pooled;
    }

    /// Gives mutable access to the mesh for a full rebuild.
    pub(crate) fn mesh_for_rebuild(&mut self) -> &mut ChunkMesh {
        self.generation += 1;
        &mut self.mesh
    }
}

/// The world-space box of a chunk centered at `center` with side length `size`.
#[inline]
pub fn chunk_bounds(center: Vec3, size: f32) -> Aabb3d {
    Aabb3d::new(center, Vec3::splat(size / 2.0))
}

/// The squared distance from `point` to the nearest point of the axis-aligned cube at `center` with side length `size`.
/// This is zero when the point is inside.
#[inline]
pub fn box_distance_squared(point: Vec3, center: Vec3, size: f32) -> f32 {
    ((point - center).abs() - Vec3::splat(size / 2.0))
        .max(Vec3::ZERO)
        .length_squared()
}
