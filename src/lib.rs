#![allow(
    clippy::doc_markdown,
    reason = "These rules should not apply to the readme."
)]
#![doc = include_str!("../README.md")]

extern crate alloc;

pub mod config;
pub mod density;
pub mod error;
pub mod generator;
pub mod manager;
pub mod marching;
pub mod mesh;
pub mod noise;
pub mod storage;
pub mod visibility;

pub use config::{NoiseSettings, Placement, TerrainConfig};
pub use error::{Result, TerrainError};
pub use generator::TerrainGenerator;
pub use manager::{ChunkManager, ChunkStats, UpdateReport};
pub use mesh::{ChunkMesh, RenderTarget, Triangle};
pub use storage::chunk::{Chunk, ChunkCoord, ChunkId};
pub use visibility::{AlwaysVisible, ChunkVisibility};
