//! Decides whether a candidate chunk is worth materializing this update.

use bevy_math::{Affine3A, Vec3, bounding::Aabb3d};
use bevy_render::primitives::{Aabb, Frustum};

/// Tests chunk boxes against whatever the viewer can see.
///
/// A chunk that fails is only skipped for the current update; it is asked about again next time.
pub trait ChunkVisibility {
    /// Whether any part of `bounds` may be visible.
    fn is_visible(&self, bounds: &Aabb3d) -> bool;
}

/// Treats every chunk as visible.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlwaysVisible;

impl ChunkVisibility for AlwaysVisible {
    #[inline]
    fn is_visible(&self, _bounds: &Aabb3d) -> bool {
        true
    }
}

impl ChunkVisibility for Frustum {
    fn is_visible(&self, bounds: &Aabb3d) -> bool {
        let aabb = Aabb::from_min_max(Vec3::from(bounds.min), Vec3::from(bounds.max));
        self.intersects_obb(&aabb, &Affine3A::IDENTITY, true, true)
    }
}

impl<F: Fn(&Aabb3d) -> bool> ChunkVisibility for F {
    #[inline]
    fn is_visible(&self, bounds: &Aabb3d) -> bool {
        self(bounds)
    }
}
