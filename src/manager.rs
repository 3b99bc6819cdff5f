//! Decides which chunks exist and keeps their meshes current.
//!
//! A [`ChunkManager`] owns every [`Chunk`] it has ever allocated.
//! Each chunk is either active (keyed by its coordinate) or waiting in the pool,
//! and in streaming mode chunks move between the two instead of being dropped.

use alloc::collections::VecDeque;

use bevy_math::{IVec3, Vec3, bounding::Aabb3d};
use bevy_platform::collections::HashMap;
use tracing::{debug, info, instrument, trace};

use crate::{
    config::{Placement, TerrainConfig, grid_chunk_count},
    density::DensitySampler,
    error::Result,
    generator::TerrainGenerator,
    marching::MarchingCubes,
    mesh::Triangle,
    storage::chunk::{Chunk, ChunkCoord, ChunkId, box_distance_squared, chunk_bounds},
    visibility::ChunkVisibility,
};

/// What one update did to the chunk set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    /// Chunks moved from active to the pool.
    pub evicted: usize,
    /// Pooled chunks reassigned to a new coordinate.
    pub reused: usize,
    /// Chunks allocated because the pool was empty.
    pub allocated: usize,
    /// Chunks dropped for good.
    pub destroyed: usize,
    /// Meshes rebuilt.
    pub rebuilt: usize,
}

impl UpdateReport {
    /// Whether the update changed nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Chunk counts at a moment in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    /// Chunks currently assigned to a coordinate.
    pub active: usize,
    /// Chunks waiting in the pool.
    pub pooled: usize,
    /// Every chunk ever allocated, including destroyed ones.
    pub allocated_total: usize,
}

impl ChunkStats {
    /// Chunks that currently exist, active or pooled.
    #[inline]
    pub fn live(&self) -> usize {
        self.active + self.pooled
    }
}

/// Owns the chunks of one terrain.
///
/// Nothing happens until [`Self::request_update`] or [`Self::tick`] is called.
/// Each of those runs to completion before returning; there is no background work.
#[derive(Debug)]
pub struct ChunkManager<G = DensitySampler> {
    config: TerrainConfig,
    generator: G,
    active: HashMap<ChunkCoord, Chunk>,
    /// The active coordinates in the order they became active.
    /// Always holds exactly the keys of `active`.
    order: Vec<ChunkCoord>,
    pool: VecDeque<Chunk>,
    next_id: ChunkId,
    allocated_total: usize,
    dirty: bool,
    scratch: Vec<Triangle>,
}

impl ChunkManager {
    /// Creates a manager that samples the density field described by `config`.
    pub fn new(config: TerrainConfig) -> Result<Self> {
        let generator = DensitySampler::new(config.noise.clone());
        Self::with_generator(config, generator)
    }
}

impl<G: TerrainGenerator> ChunkManager<G> {
    /// Creates a manager with a custom density source.
    pub fn with_generator(config: TerrainConfig, generator: G) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            active: HashMap::default(),
            order: Vec::new(),
            pool: VecDeque::new(),
            next_id: ChunkId::FIRST,
            allocated_total: 0,
            dirty: true,
            scratch: Vec::new(),
        })
    }

    /// The configuration chunks are built with.
    #[inline]
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The density source.
    #[inline]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Replaces the configuration.
    ///
    /// Nothing is rebuilt yet: the next [`Self::tick`] regenerates everything.
    /// An invalid configuration is rejected and the current one is kept.
    pub fn set_config(&mut self, config: TerrainConfig) -> Result<()> {
        config.validate()?;
        if config.noise != self.config.noise {
            self.generator.reconfigure(&config.noise);
        }
        self.config = config;
        self.dirty = true;
        debug!("terrain configuration changed");
        Ok(())
    }

    /// Whether a configuration change is waiting to be applied.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The world-space center of the chunk at `coord` under the current placement.
    #[inline]
    pub fn chunk_center(&self, coord: ChunkCoord) -> Vec3 {
        self.config.chunk_center(coord)
    }

    /// The world-space box of the chunk at `coord`.
    #[inline]
    pub fn chunk_bounds(&self, coord: ChunkCoord) -> Aabb3d {
        chunk_bounds(self.chunk_center(coord), self.config.bounds_size)
    }

    /// The active chunk at `coord`, if there is one.
    #[inline]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.active.get(&coord)
    }

    /// Active chunks in the order they became active.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.order.iter().filter_map(|coord| self.active.get(coord))
    }

    /// The chunks waiting to be reused, next-to-be-reused first.
    pub fn pooled(&self) -> impl Iterator<Item = &Chunk> {
        self.pool.iter()
    }

    /// Counts active and pooled chunks.
    pub fn stats(&self) -> ChunkStats {
        ChunkStats {
            active: self.active.len(),
            pooled: self.pool.len(),
            allocated_total: self.allocated_total,
        }
    }

    /// Regenerates the whole terrain.
    ///
    /// With a fixed grid, the grid is filled in, anything outside it is dropped, and every chunk is remeshed.
    /// When streaming, chunks out of range are pooled, those still in range are remeshed,
    /// and new chunks are brought in around `viewer`. Without a viewer, streaming does nothing.
    pub fn request_update(
        &mut self,
        viewer: Option<Vec3>,
        visibility: &impl ChunkVisibility,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        match self.config.placement {
            Placement::FixedGrid { num_chunks } => {
                self.materialize_grid(num_chunks, &mut report);
                self.rebuild_active(&mut report);
            }
            Placement::ViewerStreaming { view_distance } => {
                let Some(viewer) = viewer else {
                    debug!("no viewer to stream around; skipping update");
                    return report;
                };
                self.evict_out_of_range(viewer, view_distance, &mut report);
                self.rebuild_active(&mut report);
                self.materialize_in_view(viewer, view_distance, visibility, &mut report);
            }
        }
        self.dirty = false;
        debug_assert_eq!(self.order.len(), self.active.len());
        info!(
            active = self.active.len(),
            pooled = self.pool.len(),
            rebuilt = report.rebuilt,
            "regenerated terrain"
        );
        report
    }

    /// Runs one frame of upkeep.
    ///
    /// A pending configuration change triggers [`Self::request_update`].
    /// Otherwise a streaming terrain follows `viewer` and a fixed grid is left alone.
    pub fn tick(&mut self, viewer: Option<Vec3>, visibility: &impl ChunkVisibility) -> UpdateReport {
        if self.dirty {
            return self.request_update(viewer, visibility);
        }
        let mut report = UpdateReport::default();
        if let Placement::ViewerStreaming { view_distance } = self.config.placement
            && let Some(viewer) = viewer
        {
            self.evict_out_of_range(viewer, view_distance, &mut report);
            self.materialize_in_view(viewer, view_distance, visibility, &mut report);
            debug_assert_eq!(self.order.len(), self.active.len());
            if !report.is_empty() {
                debug!(
                    evicted = report.evicted,
                    reused = report.reused,
                    allocated = report.allocated,
                    "streamed chunks"
                );
            }
        }
        report
    }

    fn allocate(&mut self, coord: ChunkCoord) -> Chunk {
        let id = self.next_id;
        self.next_id = id.next();
        self.allocated_total += 1;
        trace!(id = id.index(), %coord, "allocated chunk");
        Chunk::new(id, coord)
    }

    /// Makes the active set exactly the grid `0..num_chunks`, in grid order.
    fn materialize_grid(&mut self, num_chunks: IVec3, report: &mut UpdateReport) {
        // A fixed grid never reuses chunks.
        report.destroyed += self.pool.len();
        self.pool.clear();

        let in_grid = |coord: &ChunkCoord| {
            coord.0.cmpge(IVec3::ZERO).all() && coord.0.cmplt(num_chunks).all()
        };
        let active = &mut self.active;
        self.order.retain(|coord| {
            if in_grid(coord) {
                return true;
            }
            debug!(%coord, "destroying chunk outside the grid");
            active.remove(coord);
            report.destroyed += 1;
            false
        });

        let count = grid_chunk_count(num_chunks);
        if count == 0 {
            // Nothing survived the teardown, and walking the other axes would find nothing either.
            return;
        }
        let mut order = Vec::with_capacity(count as usize);
        for x in 0..num_chunks.x {
            for y in 0..num_chunks.y {
                for z in 0..num_chunks.z {
                    let coord = ChunkCoord::new(x, y, z);
                    if !self.active.contains_key(&coord) {
                        let chunk = self.allocate(coord);
                        self.active.insert(coord, chunk);
                        report.allocated += 1;
                    }
                    order.push(coord);
                }
            }
        }
        self.order = order;
    }

    fn rebuild_active(&mut self, report: &mut UpdateReport) {
        for coord in &self.order {
            let Some(chunk) = self.active.get_mut(coord) else {
                continue;
            };
            rebuild_mesh(&self.config, &self.generator, &mut self.scratch, chunk);
            report.rebuilt += 1;
        }
    }

    /// Moves every active chunk farther than `view_distance` from `viewer` into the pool.
    fn evict_out_of_range(&mut self, viewer: Vec3, view_distance: f32, report: &mut UpdateReport) {
        let max_distance_squared = view_distance * view_distance;
        for i in (0..self.order.len()).rev() {
            let coord = self.order[i];
            let center = self.config.chunk_center(coord);
            if box_distance_squared(viewer, center, self.config.bounds_size) <= max_distance_squared
            {
                continue;
            }
            self.order.remove(i);
            if let Some(mut chunk) = self.active.remove(&coord) {
                debug!(%coord, id = chunk.id().index(), "pooling chunk out of range");
                chunk.set_pooled();
                self.pool.push_back(chunk);
                report.evicted += 1;
            }
        }
    }

    /// Brings in every missing chunk that is within range of `viewer` and visible.
    fn materialize_in_view(
        &mut self,
        viewer: Vec3,
        view_distance: f32,
        visibility: &impl ChunkVisibility,
        report: &mut UpdateReport,
    ) {
        let size = self.config.bounds_size;
        let max_distance_squared = view_distance * view_distance;
        let scaled = viewer / size;
        let viewer_coord = IVec3::new(
            scaled.x.round_ties_even() as i32,
            scaled.y.round_ties_even() as i32,
            scaled.z.round_ties_even() as i32,
        );
        let reach = (view_distance / size).ceil() as i32;

        for x in -reach..=reach {
            for y in -reach..=reach {
                for z in -reach..=reach {
                    // Viewers at the edge of the coordinate range have no neighbors past it.
                    let Some(coord) = offset_coord(viewer_coord, IVec3::new(x, y, z)) else {
                        continue;
                    };
                    if self.active.contains_key(&coord) {
                        continue;
                    }
                    let center = self.config.chunk_center(coord);
                    if box_distance_squared(viewer, center, size) > max_distance_squared {
                        continue;
                    }
                    if !visibility.is_visible(&chunk_bounds(center, size)) {
                        trace!(%coord, "skipping chunk outside the view");
                        continue;
                    }

                    let mut chunk = match self.pool.pop_front() {
                        Some(mut chunk) => {
                            debug!(%coord, id = chunk.id().index(), "reusing pooled chunk");
                            chunk.reassign(coord);
                            report.reused += 1;
                            chunk
                        }
                        None => {
                            report.allocated += 1;
                            self.allocate(coord)
                        }
                    };
                    rebuild_mesh(&self.config, &self.generator, &mut self.scratch, &mut chunk);
                    report.rebuilt += 1;
                    self.active.insert(coord, chunk);
                    self.order.push(coord);
                }
            }
        }
    }
}

/// `base + offset`, unless that leaves the `i32` range.
fn offset_coord(base: IVec3, offset: IVec3) -> Option<ChunkCoord> {
    Some(ChunkCoord::new(
        base.x.checked_add(offset.x)?,
        base.y.checked_add(offset.y)?,
        base.z.checked_add(offset.z)?,
    ))
}

/// Samples the chunk's lattice and replaces its mesh with the extracted surface.
#[instrument(level = "debug", skip_all, fields(coord = %chunk.coord()))]
fn rebuild_mesh<G: TerrainGenerator>(
    config: &TerrainConfig,
    generator: &G,
    scratch: &mut Vec<Triangle>,
    chunk: &mut Chunk,
) {
    let lattice = generator.generate_lattice(&config.lattice_request(chunk.coord()));
    scratch.clear();
    MarchingCubes::new(config.iso_level).extract_into(&lattice, scratch);
    chunk.mesh_for_rebuild().rebuild(scratch);
    trace!(triangles = scratch.len(), "rebuilt chunk mesh");
}

#[cfg(test)]
mod tests {
    use bevy_platform::collections::HashSet;

    use super::*;
    use crate::{config::NoiseSettings, visibility::AlwaysVisible};

    /// Solid below `y = 0`, nothing else.
    fn flat_floor() -> NoiseSettings {
        NoiseSettings {
            octaves: 1,
            noise_weight: 0.0,
            floor_offset: 0.0,
            ..Default::default()
        }
    }

    fn fixed(num_chunks: IVec3, points_per_axis: u32) -> TerrainConfig {
        TerrainConfig {
            noise: flat_floor(),
            bounds_size: 10.0,
            points_per_axis,
            placement: Placement::FixedGrid { num_chunks },
            ..Default::default()
        }
    }

    fn streaming(view_distance: f32) -> TerrainConfig {
        TerrainConfig {
            noise: flat_floor(),
            bounds_size: 10.0,
            points_per_axis: 3,
            placement: Placement::ViewerStreaming { view_distance },
            ..Default::default()
        }
    }

    fn assert_in_sync<G: TerrainGenerator>(manager: &ChunkManager<G>) {
        assert_eq!(manager.order.len(), manager.active.len());
        let listed: HashSet<_> = manager.order.iter().copied().collect();
        assert_eq!(listed.len(), manager.order.len(), "duplicate active coordinates");
        for coord in &manager.order {
            let chunk = manager.active.get(coord).unwrap();
            assert_eq!(chunk.coord(), *coord);
        }
    }

    #[test]
    fn flat_floor_single_chunk() {
        let mut manager = ChunkManager::new(fixed(IVec3::ONE, 3)).unwrap();
        let report = manager.request_update(None, &AlwaysVisible);
        assert_eq!(report.allocated, 1);
        assert_eq!(report.rebuilt, 1);

        let chunk = manager.chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        let mesh = chunk.mesh();
        // The four cells above the floor each split into two triangles lying on it.
        assert_eq!(mesh.triangle_count(), 8);
        for triangle in mesh.triangles() {
            assert!(triangle.vertices().iter().all(|v| v.y.abs() < 1e-6));
            assert!(triangle.normal().normalize().abs_diff_eq(Vec3::Y, 1e-5));
        }
        assert_eq!(mesh.indices(), (0..24).collect::<Vec<u32>>());
    }

    #[test]
    fn fixed_grid_rebuilds_everything() {
        let mut manager = ChunkManager::new(fixed(IVec3::new(2, 1, 3), 5)).unwrap();
        let first = manager.request_update(None, &AlwaysVisible);
        assert_eq!(first.allocated, 6);
        assert_eq!(first.rebuilt, 6);
        assert_in_sync(&manager);

        let second = manager.request_update(None, &AlwaysVisible);
        assert_eq!(second.allocated, 0);
        assert_eq!(second.rebuilt, 6);
        assert!(manager.chunks().all(|chunk| chunk.generation() == 2));
    }

    #[test]
    fn fixed_grid_is_origin_centered() {
        let manager = ChunkManager::new(fixed(IVec3::new(2, 2, 2), 3)).unwrap();
        assert_eq!(
            manager.chunk_center(ChunkCoord::new(0, 0, 0)),
            Vec3::splat(-5.0)
        );
        let bounds = manager.chunk_bounds(ChunkCoord::new(1, 1, 1));
        assert_eq!(Vec3::from(bounds.min), Vec3::ZERO);
        assert_eq!(Vec3::from(bounds.max), Vec3::splat(10.0));
    }

    #[test]
    fn shrinking_the_grid_destroys_chunks() {
        let mut manager = ChunkManager::new(fixed(IVec3::new(3, 1, 1), 3)).unwrap();
        manager.request_update(None, &AlwaysVisible);
        let kept = manager.chunk(ChunkCoord::new(0, 0, 0)).unwrap().id();

        manager.set_config(fixed(IVec3::new(1, 1, 1), 3)).unwrap();
        let report = manager.tick(None, &AlwaysVisible);
        assert_eq!(report.destroyed, 2);
        assert_eq!(report.allocated, 0);
        assert_eq!(manager.stats().active, 1);
        assert_eq!(manager.chunk(ChunkCoord::new(0, 0, 0)).unwrap().id(), kept);
        assert!(manager.chunk(ChunkCoord::new(2, 0, 0)).is_none());
        assert_in_sync(&manager);
    }

    #[test]
    fn switching_to_a_grid_drains_the_pool() {
        let mut manager = ChunkManager::new(streaming(10.0)).unwrap();
        manager.request_update(Some(Vec3::ZERO), &AlwaysVisible);
        let nothing = |_: &Aabb3d| false;
        manager.tick(Some(Vec3::new(200.0, 0.0, 0.0)), &nothing);
        assert_eq!(manager.stats().pooled, 27);

        manager.set_config(fixed(IVec3::ONE, 3)).unwrap();
        manager.tick(None, &AlwaysVisible);
        let stats = manager.stats();
        assert_eq!(stats.pooled, 0);
        assert_eq!(stats.active, 1);
    }

    #[test]
    fn empty_grid_has_no_chunks() {
        let mut manager = ChunkManager::new(fixed(IVec3::new(0, 4, 4), 3)).unwrap();
        let report = manager.request_update(None, &AlwaysVisible);
        assert!(report.is_empty());
        assert_eq!(manager.chunks().count(), 0);
    }

    #[test]
    fn wide_empty_grid_is_a_no_op() {
        let mut manager = ChunkManager::new(fixed(IVec3::new(50_000, 50_000, 0), 3)).unwrap();
        assert!(manager.request_update(None, &AlwaysVisible).is_empty());
        assert_eq!(manager.stats(), ChunkStats::default());
    }

    #[test]
    fn far_viewers_stay_in_range() {
        let mut manager = ChunkManager::new(streaming(20.0)).unwrap();
        manager.tick(Some(Vec3::ZERO), &AlwaysVisible);
        let active = manager.stats().active;

        let report = manager.tick(Some(Vec3::new(3.0e10, 0.0, 0.0)), &AlwaysVisible);
        assert_eq!(report.evicted, active);
        assert_eq!(manager.stats().active, 0);

        manager.tick(Some(Vec3::new(-3.0e10, 3.0e10, -3.0e10)), &AlwaysVisible);
        assert_eq!(manager.stats().active, 0);
        assert_in_sync(&manager);

        assert_eq!(
            offset_coord(IVec3::new(i32::MAX, 0, 0), IVec3::X),
            None
        );
        assert_eq!(
            offset_coord(IVec3::new(i32::MIN, 0, 0), IVec3::X),
            Some(ChunkCoord::new(i32::MIN + 1, 0, 0))
        );
    }

    #[test]
    fn missing_viewer_is_a_no_op() {
        let mut manager = ChunkManager::new(streaming(30.0)).unwrap();
        assert!(manager.request_update(None, &AlwaysVisible).is_empty());
        assert!(manager.tick(None, &AlwaysVisible).is_empty());
        assert_eq!(manager.stats(), ChunkStats::default());
        // Still waiting for a viewer to regenerate around.
        assert!(manager.is_dirty());
    }

    #[test]
    fn streaming_fills_the_view() {
        let mut manager = ChunkManager::new(streaming(30.0)).unwrap();
        let viewer = Vec3::new(1.0, 2.0, 3.0);
        manager.tick(Some(viewer), &AlwaysVisible);
        assert!(!manager.is_dirty());
        assert_in_sync(&manager);

        for chunk in manager.chunks() {
            let center = manager.chunk_center(chunk.coord());
            assert!(box_distance_squared(viewer, center, 10.0) <= 900.0);
        }
        assert!(manager.chunk(ChunkCoord::new(0, 0, 0)).is_some());
        assert!(manager.chunk(ChunkCoord::new(3, 0, 0)).is_some());
        assert!(manager.chunk(ChunkCoord::new(4, 0, 0)).is_none());
        // The corner chunk's box is over 30 units away.
        assert!(manager.chunk(ChunkCoord::new(3, 3, 3)).is_none());
    }

    #[test]
    fn visibility_only_defers() {
        let mut manager = ChunkManager::new(streaming(20.0)).unwrap();
        let east_hidden = |bounds: &Aabb3d| bounds.min.x < 0.0;
        manager.tick(Some(Vec3::ZERO), &east_hidden);
        assert!(manager.chunk(ChunkCoord::new(-1, 0, 0)).is_some());
        assert!(manager.chunk(ChunkCoord::new(1, 0, 0)).is_none());

        let report = manager.tick(Some(Vec3::ZERO), &AlwaysVisible);
        assert!(report.allocated > 0);
        assert!(manager.chunk(ChunkCoord::new(1, 0, 0)).is_some());
    }

    #[test]
    fn moving_away_pools_and_coming_back_reuses() {
        let mut manager = ChunkManager::new(streaming(10.0)).unwrap();
        manager.tick(Some(Vec3::ZERO), &AlwaysVisible);
        let first = manager.stats();

        let report = manager.tick(Some(Vec3::new(500.0, 0.0, 0.0)), &AlwaysVisible);
        assert_eq!(report.evicted, first.active);
        assert_eq!(report.allocated, 0);
        assert_eq!(report.reused, first.active);
        assert!(manager.chunks().all(|chunk| chunk.coord().0.x >= 49));

        let stats = manager.stats();
        assert_eq!(stats.allocated_total, first.allocated_total);
        assert_in_sync(&manager);
    }

    #[test]
    fn regeneration_remeshes_survivors_only_once() {
        let mut manager = ChunkManager::new(streaming(15.0)).unwrap();
        manager.tick(Some(Vec3::ZERO), &AlwaysVisible);
        let mut config = streaming(15.0);
        config.noise.floor_offset = 2.0;
        manager.set_config(config).unwrap();
        let report = manager.tick(Some(Vec3::ZERO), &AlwaysVisible);
        assert_eq!(report.rebuilt, manager.stats().active);
        assert!(manager.chunks().all(|chunk| chunk.generation() == 2));
    }

    #[test]
    fn points_per_axis_changes_on_regeneration() {
        let mut manager = ChunkManager::new(fixed(IVec3::ONE, 3)).unwrap();
        manager.request_update(None, &AlwaysVisible);
        assert_eq!(
            manager.chunks().next().unwrap().mesh().triangle_count(),
            8
        );

        manager.set_config(fixed(IVec3::ONE, 5)).unwrap();
        // Not applied until the next regeneration.
        assert_eq!(
            manager.chunks().next().unwrap().mesh().triangle_count(),
            8
        );
        manager.tick(None, &AlwaysVisible);
        // 4x4 cells above the floor.
        assert_eq!(
            manager.chunks().next().unwrap().mesh().triangle_count(),
            32
        );
    }

    #[test]
    fn rejected_config_keeps_the_old_one() {
        let mut manager = ChunkManager::new(fixed(IVec3::ONE, 3)).unwrap();
        manager.request_update(None, &AlwaysVisible);
        let mut bad = fixed(IVec3::ONE, 3);
        bad.points_per_axis = 1;
        assert!(manager.set_config(bad).is_err());
        assert_eq!(manager.config().points_per_axis, 3);
        assert!(!manager.is_dirty());

        assert!(ChunkManager::new(fixed(IVec3::ONE, 101)).is_err());
    }

    #[test]
    fn custom_generators() {
        let sphere = |p: Vec3| 4.0 - p.length();
        let mut manager = ChunkManager::with_generator(fixed(IVec3::ONE, 11), sphere).unwrap();
        manager.request_update(None, &AlwaysVisible);
        let mesh = manager.chunks().next().unwrap().mesh();
        assert!(!mesh.is_empty());
        for v in mesh.vertices() {
            assert!((v.length() - 4.0).abs() < 0.5, "{v}");
        }
    }
}
