//! Turns [`NoiseField`] into a terrain density field and samples it onto chunk lattices.

use bevy_math::{UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    config::NoiseSettings,
    generator::TerrainGenerator,
    noise::NoiseField,
    storage::lattice::{Lattice, LatticePoint},
};

/// Per-octave sampling offsets.
///
/// These decorrelate octaves from each other and are the only thing the seed influences.
#[derive(Debug, Clone, PartialEq)]
pub struct OctaveOffsets(Vec<Vec3>);

impl OctaveOffsets {
    /// Each offset component is drawn uniformly from `-RANGE..=RANGE`.
    pub const RANGE: f32 = 1000.0;

    /// Draws `octaves` offsets from a generator seeded with `seed`.
    pub fn from_seed(seed: i32, octaves: u32) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        let offsets = (0..octaves)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                ) * Self::RANGE
            })
            .collect();
        Self(offsets)
    }

    /// The offsets, one per octave.
    #[inline]
    pub fn as_slice(&self) -> &[Vec3] {
        &self.0
    }
}

/// Where and how densely to sample a chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeRequest {
    /// Samples along each axis.
    pub points_per_axis: u32,
    /// The side length of the chunk.
    pub bounds_size: f32,
    /// The extent of the whole world, if edges should be closed against it.
    pub world_bounds: Option<Vec3>,
    /// The world-space center of the chunk.
    pub chunk_center: Vec3,
    /// Added to every noise sample position.
    pub global_offset: Vec3,
    /// The distance between neighboring samples.
    pub spacing: f32,
}

impl LatticeRequest {
    /// The world position of lattice coordinate `coord`.
    /// The lattice is centered on [`Self::chunk_center`].
    #[inline]
    pub fn world_position(&self, coord: UVec3) -> Vec3 {
        self.chunk_center + coord.as_vec3() * self.spacing - Vec3::splat(self.bounds_size / 2.0)
    }
}

/// Evaluates the terrain density anywhere in the world.
///
/// The density depends only on the settings and the world position asked about, never on which chunk is asking.
/// That is what keeps neighboring chunks seamless.
#[derive(Debug, Clone)]
pub struct DensitySampler {
    settings: NoiseSettings,
    offsets: OctaveOffsets,
    noise: NoiseField,
}

impl DensitySampler {
    /// Creates a sampler, drawing the octave offsets for `settings.seed`.
    pub fn new(settings: NoiseSettings) -> Self {
        let offsets = OctaveOffsets::from_seed(settings.seed, settings.octaves);
        Self {
            settings,
            offsets,
            noise: NoiseField,
        }
    }

    /// The settings this sampler was built from.
    #[inline]
    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// The octave offsets in use.
    #[inline]
    pub fn offsets(&self) -> &OctaveOffsets {
        &self.offsets
    }

    /// Accumulates the ridged fractal noise at `world_pos`.
    pub fn fractal_noise(&self, world_pos: Vec3, global_offset: Vec3) -> f32 {
        let s = &self.settings;
        let mut noise = 0.0;
        let mut frequency = s.noise_scale / 100.0;
        let mut amplitude = 1.0;
        let mut weight = 1.0;
        for &octave_offset in self.offsets.as_slice() {
            let n = self
                .noise
                .sample(world_pos * frequency + octave_offset + global_offset);
            let mut v = 1.0 - n.abs();
            v *= v;
            v *= weight;
            weight = (v * s.weight_multiplier).clamp(0.0, 1.0);
            noise += v * amplitude;
            amplitude *= s.persistence;
            frequency *= s.lacunarity;
        }
        noise
    }

    /// The density at `world_pos`.
    ///
    /// `world_bounds` and `spacing` only matter when edges are being closed.
    pub fn density_at(
        &self,
        world_pos: Vec3,
        global_offset: Vec3,
        world_bounds: Option<Vec3>,
        spacing: f32,
    ) -> f32 {
        let s = &self.settings;
        let noise = self.fractal_noise(world_pos, global_offset);

        let mut density = -(world_pos.y + s.floor_offset) + noise * s.noise_weight;
        if s.aux_frequency() != 0.0 {
            density += (world_pos.y % s.aux_frequency()) * s.aux_strength();
        }

        // This is an offset, not a clamp, so density may be non-monotonic around the floor.
        if world_pos.y < s.hard_floor_height {
            density += s.hard_floor_weight;
        }

        if let Some(world_bounds) = world_bounds.filter(|_| s.close_edges) {
            let edge_offset = world_pos.abs() * 2.0 - world_bounds + Vec3::splat(spacing / 2.0);
            let edge_weight = if edge_offset.max_element() > 0.0 {
                1.0
            } else {
                0.0
            };
            density = density * (1.0 - edge_weight) - s.edge_sentinel * edge_weight;
        }

        density
    }

    /// Samples the lattice described by `request`.
    pub fn generate(&self, request: &LatticeRequest) -> Lattice {
        Lattice::from_fn(request.points_per_axis, |coord| {
            let pos = request.world_position(coord);
            let density = self.density_at(
                pos,
                request.global_offset,
                request.world_bounds,
                request.spacing,
            );
            LatticePoint::new(pos, density)
        })
    }
}

impl TerrainGenerator for DensitySampler {
    fn generate_lattice(&self, request: &LatticeRequest) -> Lattice {
        self.generate(request)
    }

    fn reconfigure(&mut self, settings: &NoiseSettings) {
        *self = Self::new(settings.clone());
    }
}
