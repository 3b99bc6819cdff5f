//! Parameters for one generation pass.
//!
//! A [`TerrainConfig`] is plain data.
//! It's validated once, when handed to a [`ChunkManager`](crate::manager::ChunkManager), and never changes while chunks are being built.

use std::path::Path;

use bevy_math::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    density::LatticeRequest,
    error::{Result, TerrainError},
    storage::chunk::ChunkCoord,
};

/// The fewest samples per axis a chunk can have (one cell).
pub const MIN_POINTS_PER_AXIS: u32 = 2;
/// The most samples per axis a chunk can have.
pub const MAX_POINTS_PER_AXIS: u32 = 100;
/// The most octaves [`NoiseSettings::octaves`] may request.
pub const MAX_OCTAVES: u32 = 32;
/// The most chunks a fixed grid may hold.
pub const MAX_GRID_CHUNKS: u64 = 1 << 18;
/// The furthest a streaming view may reach, in chunks.
pub const MAX_VIEW_CHUNKS: f32 = 32.0;

/// How many chunks a fixed grid of `num_chunks` holds. Negative extents count as empty.
pub fn grid_chunk_count(num_chunks: IVec3) -> u64 {
    let extent = num_chunks.max(IVec3::ZERO);
    extent.x as u64 * extent.y as u64 * extent.z as u64
}

/// Shapes the density field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Seeds the per-octave sampling offsets. The noise tables themselves are fixed.
    pub seed: i32,
    /// How many layers of noise to stack.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f32,
    /// Amplitude multiplier between octaves.
    pub persistence: f32,
    /// Scales the base frequency, which is `noise_scale / 100`.
    pub noise_scale: f32,
    /// How strongly the accumulated noise moves the surface.
    pub noise_weight: f32,
    /// Shifts the ground plane: the surface sits near `y = -floor_offset` when noise is off.
    pub floor_offset: f32,
    /// Scales how much each octave's value gates the next octave.
    pub weight_multiplier: f32,
    /// Below this height, [`Self::hard_floor_weight`] is added to the density.
    pub hard_floor_height: f32,
    /// Added (not clamped) to the density below [`Self::hard_floor_height`].
    pub hard_floor_weight: f32,
    /// Periodic terracing: `x` is the period along `y` and `y` the strength. `z` and `w` are unused.
    /// A period of zero disables the term.
    pub aux_params: [f32; 4],
    /// Forces the density fully outside past the world bounds of a fixed grid, closing the surface there.
    pub close_edges: bool,
    /// How far outside a closed edge is pushed: the density becomes `-edge_sentinel`.
    pub edge_sentinel: f32,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            noise_scale: 1.0,
            noise_weight: 1.0,
            floor_offset: 1.0,
            weight_multiplier: 1.0,
            hard_floor_height: 0.0,
            hard_floor_weight: 0.0,
            aux_params: [0.0; 4],
            close_edges: false,
            edge_sentinel: 100.0,
        }
    }
}

impl NoiseSettings {
    /// The period of the auxiliary terracing term.
    #[inline]
    pub fn aux_frequency(&self) -> f32 {
        self.aux_params[0]
    }

    /// The strength of the auxiliary terracing term.
    #[inline]
    pub fn aux_strength(&self) -> f32 {
        self.aux_params[1]
    }
}

/// Decides which chunks exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Placement {
    /// A dense, origin-centered block of `num_chunks` chunks, all remeshed on every regeneration.
    FixedGrid {
        /// The extent of the grid in chunks.
        num_chunks: IVec3,
    },
    /// Chunks within `view_distance` of a viewer stream in and out as it moves.
    ViewerStreaming {
        /// How far from the viewer chunks are kept.
        view_distance: f32,
    },
}

impl Default for Placement {
    fn default() -> Self {
        Self::FixedGrid {
            num_chunks: IVec3::ONE,
        }
    }
}

/// Everything needed to generate terrain for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// The density field.
    pub noise: NoiseSettings,
    /// The density at which the surface is extracted.
    pub iso_level: f32,
    /// The side length of each cubic chunk in world units.
    pub bounds_size: f32,
    /// Samples along each chunk axis, within [`MIN_POINTS_PER_AXIS`]..=[`MAX_POINTS_PER_AXIS`].
    pub points_per_axis: u32,
    /// Added to every noise sample position; pans the terrain without moving chunks.
    pub offset: Vec3,
    /// How chunks are placed.
    pub placement: Placement,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            iso_level: 0.0,
            bounds_size: 10.0,
            points_per_axis: 30,
            offset: Vec3::ZERO,
            placement: Placement::default(),
        }
    }
}

impl TerrainConfig {
    /// Parses a configuration from TOML and validates it.
    /// Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks that this configuration can generate terrain.
    pub fn validate(&self) -> Result<()> {
        let result = self.check();
        if let Err(err) = &result {
            warn!("rejected terrain configuration: {err}");
        }
        result
    }

    fn check(&self) -> Result<()> {
        if !(MIN_POINTS_PER_AXIS..=MAX_POINTS_PER_AXIS).contains(&self.points_per_axis) {
            return Err(TerrainError::PointsPerAxisOutOfRange {
                points_per_axis: self.points_per_axis,
            });
        }
        if !(self.bounds_size.is_finite() && self.bounds_size > 0.0) {
            return Err(TerrainError::NonPositiveBoundsSize {
                bounds_size: self.bounds_size,
            });
        }
        if self.noise.octaves > MAX_OCTAVES {
            return Err(TerrainError::TooManyOctaves {
                octaves: self.noise.octaves,
            });
        }
        match self.placement {
            Placement::FixedGrid { num_chunks } if num_chunks.min_element() < 0 => {
                Err(TerrainError::NegativeGrid { num_chunks })
            }
            Placement::FixedGrid { num_chunks }
                if grid_chunk_count(num_chunks) > MAX_GRID_CHUNKS =>
            {
                Err(TerrainError::GridTooLarge { num_chunks })
            }
            Placement::ViewerStreaming { view_distance }
                if !(view_distance.is_finite() && view_distance >= 0.0) =>
            {
                Err(TerrainError::NegativeViewDistance { view_distance })
            }
            Placement::ViewerStreaming { view_distance }
                if view_distance / self.bounds_size > MAX_VIEW_CHUNKS =>
            {
                Err(TerrainError::ViewDistanceTooLarge {
                    view_distance,
                    bounds_size: self.bounds_size,
                })
            }
            _ => Ok(()),
        }
    }

    /// The distance between neighboring lattice samples.
    #[inline]
    pub fn spacing(&self) -> f32 {
        self.bounds_size / (self.points_per_axis - 1) as f32
    }

    /// The world-space extent that closed edges are measured against.
    /// Only a fixed grid has one; streamed terrain is unbounded.
    pub fn world_bounds(&self) -> Option<Vec3> {
        match self.placement {
            Placement::FixedGrid { num_chunks } => Some(num_chunks.as_vec3() * self.bounds_size),
            Placement::ViewerStreaming { .. } => None,
        }
    }

    /// The world-space center of the chunk at `coord`.
    ///
    /// A fixed grid is centered on the origin as a whole.
    /// Streamed chunks are centered on `coord * bounds_size`, so the viewer's own chunk is the one it's nearest the center of.
    pub fn chunk_center(&self, coord: ChunkCoord) -> Vec3 {
        let size = self.bounds_size;
        match self.placement {
            Placement::FixedGrid { num_chunks } => {
                -num_chunks.as_vec3() * size / 2.0
                    + coord.0.as_vec3() * size
                    + Vec3::splat(size / 2.0)
            }
            Placement::ViewerStreaming { .. } => coord.0.as_vec3() * size,
        }
    }

    /// Describes the lattice to sample for the chunk at `coord`.
    pub fn lattice_request(&self, coord: ChunkCoord) -> LatticeRequest {
        LatticeRequest {
            points_per_axis: self.points_per_axis,
            bounds_size: self.bounds_size,
            world_bounds: self.world_bounds(),
            chunk_center: self.chunk_center(coord),
            global_offset: self.offset,
            spacing: self.spacing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        TerrainConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_resolution() {
        for points_per_axis in [0, 1, 101] {
            let config = TerrainConfig {
                points_per_axis,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(TerrainError::PointsPerAxisOutOfRange { .. })
            ));
        }
        for points_per_axis in [2, 100] {
            let config = TerrainConfig {
                points_per_axis,
                ..Default::default()
            };
            config.validate().unwrap();
        }
    }

    #[test]
    fn rejects_bad_bounds() {
        for bounds_size in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = TerrainConfig {
                bounds_size,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(TerrainError::NonPositiveBoundsSize { .. })
            ));
        }
    }

    #[test]
    fn rejects_bad_placement() {
        let config = TerrainConfig {
            placement: Placement::FixedGrid {
                num_chunks: IVec3::new(1, -1, 1),
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TerrainError::NegativeGrid { .. })
        ));

        let config = TerrainConfig {
            placement: Placement::ViewerStreaming {
                view_distance: -3.0,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TerrainError::NegativeViewDistance { .. })
        ));
    }

    #[test]
    fn rejects_oversized_placements() {
        let grid = |num_chunks| TerrainConfig {
            placement: Placement::FixedGrid { num_chunks },
            ..Default::default()
        };
        assert!(matches!(
            grid(IVec3::new(1000, 1000, 1)).validate(),
            Err(TerrainError::GridTooLarge { .. })
        ));
        // Empty, however wide.
        grid(IVec3::new(50_000, 50_000, 0)).validate().unwrap();
        assert_eq!(grid_chunk_count(IVec3::new(50_000, 50_000, 0)), 0);
        assert_eq!(grid_chunk_count(IVec3::new(-5, 2, 2)), 0);

        let view = |view_distance| TerrainConfig {
            bounds_size: 10.0,
            placement: Placement::ViewerStreaming { view_distance },
            ..Default::default()
        };
        view(320.0).validate().unwrap();
        assert!(matches!(
            view(1.0e6).validate(),
            Err(TerrainError::ViewDistanceTooLarge { .. })
        ));
    }

    #[test]
    fn parses_partial_toml() {
        let config = TerrainConfig::from_toml_str(
            r#"
            bounds_size = 8.0
            points_per_axis = 9

            [noise]
            seed = 7
            octaves = 6
            close_edges = true

            [placement]
            mode = "viewer_streaming"
            view_distance = 45.0
            "#,
        )
        .unwrap();

        assert_eq!(config.bounds_size, 8.0);
        assert_eq!(config.spacing(), 1.0);
        assert_eq!(config.noise.seed, 7);
        assert_eq!(config.noise.octaves, 6);
        assert_eq!(config.noise.lacunarity, 2.0);
        assert_eq!(
            config.placement,
            Placement::ViewerStreaming {
                view_distance: 45.0
            }
        );
        assert_eq!(config.world_bounds(), None);
    }

    #[test]
    fn parses_fixed_grid() {
        let config = TerrainConfig::from_toml_str(
            r#"
            [placement]
            mode = "fixed_grid"
            num_chunks = [3, 1, 2]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.world_bounds(),
            Some(Vec3::new(30.0, 10.0, 20.0))
        );
    }

    #[test]
    fn chunk_centers() {
        let fixed = TerrainConfig {
            bounds_size: 10.0,
            placement: Placement::FixedGrid {
                num_chunks: IVec3::new(2, 1, 3),
            },
            ..Default::default()
        };
        assert_eq!(
            fixed.chunk_center(ChunkCoord::new(0, 0, 0)),
            Vec3::new(-5.0, 0.0, -10.0)
        );
        assert_eq!(
            fixed.chunk_center(ChunkCoord::new(1, 0, 2)),
            Vec3::new(5.0, 0.0, 10.0)
        );

        let streaming = TerrainConfig {
            bounds_size: 10.0,
            placement: Placement::ViewerStreaming {
                view_distance: 30.0,
            },
            ..Default::default()
        };
        assert_eq!(
            streaming.chunk_center(ChunkCoord::new(-1, 2, 0)),
            Vec3::new(-10.0, 20.0, 0.0)
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            TerrainConfig::from_toml_str("points_per_axis = \"many\""),
            Err(TerrainError::InvalidConfigFile(_))
        ));
        assert!(matches!(
            TerrainConfig::from_toml_str("points_per_axis = 1"),
            Err(TerrainError::PointsPerAxisOutOfRange { points_per_axis: 1 })
        ));
    }
}
