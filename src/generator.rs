//! Contains logic for what a terrain may look like.

use bevy_math::Vec3;

use crate::{
    config::NoiseSettings,
    density::LatticeRequest,
    storage::lattice::{Lattice, LatticePoint},
};

/// Represents a type that can dictate the shape of a terrain.
///
/// Implementations must be pure: the same request always yields the same lattice,
/// and a world position shared by two requests always gets the same density.
pub trait TerrainGenerator {
    /// Samples the density field over the lattice described by `request`.
    fn generate_lattice(&self, request: &LatticeRequest) -> Lattice;

    /// Called when the noise settings of the terrain change.
    /// Generators that don't depend on them can ignore this.
    fn reconfigure(&mut self, _settings: &NoiseSettings) {}
}

/// Any density function of world position is a generator.
impl<F: Fn(Vec3) -> f32> TerrainGenerator for F {
    fn generate_lattice(&self, request: &LatticeRequest) -> Lattice {
        Lattice::from_fn(request.points_per_axis, |coord| {
            let pos = request.world_position(coord);
            LatticePoint::new(pos, self(pos))
        })
    }
}
