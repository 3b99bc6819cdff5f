//! Owned per-chunk data: sampled lattices and the chunks themselves.

pub mod chunk;
pub mod lattice;
