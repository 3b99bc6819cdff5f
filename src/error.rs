//! Errors surfaced before any generation work starts.

use bevy_math::IVec3;
use thiserror::Error;

/// Everything that can go wrong when configuring terrain generation.
///
/// Once a configuration has been accepted, generation itself cannot fail.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Each chunk needs at least one cell and no more than a reasonable number of samples.
    #[error(
        "points per axis must be within {min}..={max}, got {points_per_axis}",
        min = crate::config::MIN_POINTS_PER_AXIS,
        max = crate::config::MAX_POINTS_PER_AXIS
    )]
    PointsPerAxisOutOfRange {
        /// The rejected value.
        points_per_axis: u32,
    },
    /// Chunks must have a positive, finite size.
    #[error("chunk bounds size must be positive and finite, got {bounds_size}")]
    NonPositiveBoundsSize {
        /// The rejected value.
        bounds_size: f32,
    },
    /// A streaming view distance can't be negative.
    #[error("view distance must be non-negative and finite, got {view_distance}")]
    NegativeViewDistance {
        /// The rejected value.
        view_distance: f32,
    },
    /// A fixed grid can't have a negative extent.
    #[error("fixed grid chunk counts must be non-negative, got {num_chunks}")]
    NegativeGrid {
        /// The rejected value.
        num_chunks: IVec3,
    },
    /// A fixed grid holds more chunks than can reasonably be generated.
    #[error(
        "fixed grid of {num_chunks} holds more than {max} chunks",
        max = crate::config::MAX_GRID_CHUNKS
    )]
    GridTooLarge {
        /// The rejected value.
        num_chunks: IVec3,
    },
    /// A streaming view reaches further than [`MAX_VIEW_CHUNKS`](crate::config::MAX_VIEW_CHUNKS) chunks.
    #[error(
        "view distance {view_distance} spans more than {max} chunks of size {bounds_size}",
        max = crate::config::MAX_VIEW_CHUNKS
    )]
    ViewDistanceTooLarge {
        /// The rejected view distance.
        view_distance: f32,
        /// The chunk size it was measured against.
        bounds_size: f32,
    },
    /// Past this many octaves the amplitude is gone and the frequency overflows.
    #[error("at most {max} octaves are supported, got {octaves}", max = crate::config::MAX_OCTAVES)]
    TooManyOctaves {
        /// The rejected value.
        octaves: u32,
    },
    /// A configuration file didn't parse.
    #[error("invalid terrain configuration: {0}")]
    InvalidConfigFile(#[from] toml::de::Error),
    /// A configuration file couldn't be read.
    #[error("could not read terrain configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand for results in this crate.
pub type Result<T, E = TerrainError> = core::result::Result<T, E>;
