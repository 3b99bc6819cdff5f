//! Contains the sampled density lattice of a chunk.

use bevy_math::{UVec3, Vec3, Vec4};

/// One sample of the density field: a world position and the density there.
///
/// This is stored homogeneously as `(x, y, z, density)` so that interpolating between two samples
/// interpolates the position and density together.
#[repr(transparent)]
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct LatticePoint(Vec4);

impl LatticePoint {
    /// Constructs a sample at `position` with `density`.
    #[inline]
    pub const fn new(position: Vec3, density: f32) -> Self {
        Self(Vec4::new(position.x, position.y, position.z, density))
    }

    /// The world position of the sample.
    #[inline]
    pub fn position(self) -> Vec3 {
        self.0.truncate()
    }

    /// The density at [`Self::position`].
    #[inline]
    pub fn density(self) -> f32 {
        self.0.w
    }

    /// The raw `(x, y, z, density)` sample.
    #[inline]
    pub const fn homogeneous(self) -> Vec4 {
        self.0
    }
}

/// A cubic grid of [`LatticePoint`]s, `points_per_axis` to a side.
///
/// Points are stored x-fastest: the point at `(x, y, z)` lives at `z * n * n + y * n + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    points_per_axis: u32,
    points: Vec<LatticePoint>,
}

impl Lattice {
    /// Builds a lattice by calling `sample` for every lattice coordinate in storage order.
    pub fn from_fn(points_per_axis: u32, mut sample: impl FnMut(UVec3) -> LatticePoint) -> Self {
        let n = points_per_axis as usize;
        let mut points = Vec::with_capacity(n * n * n);
        for z in 0..points_per_axis {
            for y in 0..points_per_axis {
                for x in 0..points_per_axis {
                    points.push(sample(UVec3::new(x, y, z)));
                }
            }
        }
        Self {
            points_per_axis,
            points,
        }
    }

    /// Wraps already-ordered points.
    /// Returns `None` if there are not exactly `points_per_axis³` of them.
    pub fn from_points(points_per_axis: u32, points: Vec<LatticePoint>) -> Option<Self> {
        let n = points_per_axis as usize;
        (points.len() == n * n * n).then_some(Self {
            points_per_axis,
            points,
        })
    }

    /// The index of the point at `(x, y, z)` in a lattice with `points_per_axis` to a side.
    #[inline]
    pub const fn index(points_per_axis: u32, x: u32, y: u32, z: u32) -> usize {
        let n = points_per_axis as usize;
        z as usize * n * n + y as usize * n + x as usize
    }

    /// The number of points along each axis.
    #[inline]
    pub const fn points_per_axis(&self) -> u32 {
        self.points_per_axis
    }

    /// The number of cells along each axis, one fewer than the points.
    #[inline]
    pub const fn cells_per_axis(&self) -> u32 {
        self.points_per_axis.saturating_sub(1)
    }

    /// Gets the point at `coord`.
    ///
    /// # Panics
    ///
    /// Panics if `coord` is outside the lattice.
    #[inline]
    pub fn get(&self, coord: UVec3) -> LatticePoint {
        self.points[Self::index(self.points_per_axis, coord.x, coord.y, coord.z)]
    }

    /// All points in storage order.
    #[inline]
    pub fn points(&self) -> &[LatticePoint] {
        &self.points
    }

    /// Iterates the minimum corner of every cell, x-fastest.
    pub fn cells(&self) -> impl Iterator<Item = UVec3> + use<> {
        let cells = self.cells_per_axis();
        (0..cells).flat_map(move |z| {
            (0..cells).flat_map(move |y| (0..cells).map(move |x| UVec3::new(x, y, z)))
        })
    }
}
