//! Extracts an isosurface from a [`Lattice`] one cell at a time.

pub mod tables;

use arrayvec::ArrayVec;
use bevy_math::{UVec3, Vec3};

use crate::{
    mesh::Triangle,
    storage::lattice::{Lattice, LatticePoint},
};
use tables::{CORNER_OFFSETS, EDGE_CORNER_A, EDGE_CORNER_B, END, TRIANGULATIONS};

/// The most triangles a single cell can produce.
pub const MAX_CELL_TRIANGLES: usize = 5;

/// The classic marching cubes extractor.
///
/// A corner is "inside" when its density is strictly below [`Self::iso_level`].
/// Triangles are emitted so that [`Triangle::normal`] points from higher density towards lower density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchingCubes {
    /// The density the surface passes through.
    pub iso_level: f32,
}

impl MarchingCubes {
    /// Creates an extractor for the surface at `iso_level`.
    #[inline]
    pub const fn new(iso_level: f32) -> Self {
        Self { iso_level }
    }

    /// Gathers the 8 samples around the cell whose minimum corner is `cell`.
    pub fn cell_corners(lattice: &Lattice, cell: UVec3) -> [LatticePoint; 8] {
        CORNER_OFFSETS.map(|offset| lattice.get(cell + offset))
    }

    /// The 8-bit configuration of `corners`: bit `i` is set when corner `i` is inside.
    pub fn case_index(&self, corners: &[LatticePoint; 8]) -> u8 {
        corners
            .iter()
            .enumerate()
            .filter(|(_, corner)| corner.density() < self.iso_level)
            .fold(0, |case, (i, _)| case | (1 << i))
    }

    /// Triangulates one cell.
    pub fn triangulate(
        &self,
        corners: &[LatticePoint; 8],
    ) -> ArrayVec<Triangle, MAX_CELL_TRIANGLES> {
        let edges = &TRIANGULATIONS[self.case_index(corners) as usize];
        let mut triangles = ArrayVec::new();
        for group in edges.chunks_exact(3) {
            if group[0] == END {
                break;
            }
            let [a, b, c] = [group[0], group[1], group[2]].map(|edge| {
                let edge = edge as usize;
                self.interpolate(corners[EDGE_CORNER_A[edge]], corners[EDGE_CORNER_B[edge]])
            });
            // The table's edge order winds inward for this corner layout.
            triangles.push(Triangle([c, b, a]));
        }
        triangles
    }

    /// Triangulates the cell at `cell`, appending to `out`.
    pub fn march(&self, lattice: &Lattice, cell: UVec3, out: &mut Vec<Triangle>) {
        out.extend(self.triangulate(&Self::cell_corners(lattice, cell)));
    }

    /// Triangulates every cell of `lattice`, appending to `out` in cell order.
    pub fn extract_into(&self, lattice: &Lattice, out: &mut Vec<Triangle>) {
        for cell in lattice.cells() {
            self.march(lattice, cell, out);
        }
    }

    /// Triangulates every cell of `lattice`.
    pub fn extract(&self, lattice: &Lattice) -> Vec<Triangle> {
        let mut triangles = Vec::new();
        self.extract_into(lattice, &mut triangles);
        triangles
    }

    /// Finds where the surface crosses the edge from `a` to `b`.
    /// Equal densities can't be interpolated, so they resolve to `a`.
    fn interpolate(&self, a: LatticePoint, b: LatticePoint) -> Vec3 {
        let denominator = b.density() - a.density();
        let t = if denominator == 0.0 {
            0.0
        } else {
            (self.iso_level - a.density()) / denominator
        };
        let a = a.homogeneous();
        (a + t * (b.homogeneous() - a)).truncate()
    }
}
