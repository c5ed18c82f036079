//! The planet quadtree driver.
//!
//! `PlanetLodManager::tick` runs once per frame on one thread. It applies
//! finished mesh jobs, recomputes camera distances when the viewport moved
//! (spread over several ticks), splits and combines quads, and keeps render
//! proxies in sync with the leaves that should be drawn.

use std::sync::Arc;

use glam::{DVec3, Quat};
use quadsphere_config::{Config, LodModeBehindCam, PlanetConfig};
use quadsphere_cubesphere::{Direction, QuadPath, RootFace, neighbor_paths};
use quadsphere_mesh::{
    EdgeConfiguration, MeshBuildPipeline, MeshBuildRequest, MeshBuildResult, MeshBuilder, MeshData,
    MeshJobTicket, QuadGeometry,
};
use quadsphere_terrain::{HeightSource, TerrainHeight};

use crate::LodError;
use crate::arena::{QuadArena, QuadHandle};
use crate::backend::{ProxyDesc, ProxyPool, RenderBackend};
use crate::frustum::{Aabb, Frustum};
use crate::quad::Quad;
use crate::split_queue::SplitQueue;
use crate::viewer::Viewer;

/// Trailing digits dropped at most when looking for a coarser neighbor.
const MAX_NEIGHBOR_TRIMS: usize = 3;

/// Snapshot of quadtree and pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LodStats {
    pub quads: usize,
    /// Quads without children.
    pub leaves: usize,
    pub max_level: u8,
    pub splitting: usize,
    pub queued_splits: usize,
    pub proxies: usize,
    pub pooled_quads: usize,
    pub pooled_proxies: usize,
    pub pending_jobs: usize,
    pub stale_results: u64,
    pub failed_builds: u64,
    pub sync_fallbacks: u64,
    pub distance_pass_active: bool,
}

/// A time-sliced distance recompute over a snapshot of live quads.
#[derive(Debug)]
struct DistancePass {
    handles: Vec<QuadHandle>,
    cursor: usize,
}

/// Owns one planet's quadtree and drives its level of detail.
pub struct PlanetLodManager<B: RenderBackend> {
    settings: PlanetConfig,
    arena: QuadArena,
    split_queue: SplitQueue,
    splitting: Vec<QuadHandle>,
    combine_retry: Vec<QuadHandle>,
    proxies: ProxyPool,
    backend: B,
    pipeline: MeshBuildPipeline,
    deferred: Vec<MeshBuildResult>,
    radius: f64,
    max_radius: f64,
    origin: DVec3,
    camera: DVec3,
    vis_sphere_sqr: f64,
    frustum: Option<Frustum>,
    last_view: Option<(DVec3, Quat)>,
    distance_pass: Option<DistancePass>,
    next_job: u64,
    stale_results: u64,
    failed_builds: u64,
    sync_fallbacks: u64,
}

impl<B: RenderBackend> PlanetLodManager<B> {
    /// Validate `config`, build its height source and create the six roots.
    pub fn new(config: &Config, backend: B) -> Result<Self, LodError> {
        config.validate()?;
        let source = TerrainHeight::from_config(&config.terrain)?;
        Self::create(config, backend, Arc::new(source))
    }

    /// Like [`new`](Self::new) but with a caller-supplied height source.
    pub fn with_height_source(
        config: &Config,
        backend: B,
        source: Arc<dyn HeightSource>,
    ) -> Result<Self, LodError> {
        config.validate()?;
        Self::create(config, backend, source)
    }

    fn create(config: &Config, backend: B, source: Arc<dyn HeightSource>) -> Result<Self, LodError> {
        let builder = Arc::new(MeshBuilder::new(config, source)?);
        let radius = builder.radius();
        let max_radius = builder.max_radius();
        let pipeline = MeshBuildPipeline::new(
            config.mesh.worker_threads,
            config.mesh.max_in_flight,
            builder,
        );

        let mut manager = Self {
            settings: config.planet.clone(),
            arena: QuadArena::new(QuadArena::POOL_CAPACITY),
            split_queue: SplitQueue::new(),
            splitting: Vec::new(),
            combine_retry: Vec::new(),
            proxies: ProxyPool::new(ProxyPool::CAPACITY),
            backend,
            pipeline,
            deferred: Vec::new(),
            radius,
            max_radius,
            origin: DVec3::ZERO,
            camera: DVec3::ZERO,
            vis_sphere_sqr: 0.0,
            frustum: None,
            last_view: None,
            distance_pass: None,
            next_job: 0,
            stale_results: 0,
            failed_builds: 0,
            sync_fallbacks: 0,
        };
        manager.init_roots();
        Ok(manager)
    }

    fn init_roots(&mut self) {
        let roots: Vec<QuadHandle> = RootFace::ALL
            .into_iter()
            .filter_map(|face| self.arena.insert(QuadPath::root(face), None))
            .collect();
        for &root in &roots {
            self.refresh_neighbors(root);
        }
        tracing::info!(
            "Planet initialized: radius {}, {} detail levels, {} roots",
            self.radius,
            self.settings.detail_distances.len(),
            roots.len()
        );
    }

    // --- Per-frame update ---

    /// Advance the quadtree one frame for `viewer`.
    pub fn tick(&mut self, viewer: &Viewer) {
        self.observe(viewer);
        let changed = self.viewport_changed(viewer);
        self.apply_results();
        self.update_distances(changed);
        self.retry_combines();
        self.service_splits();
    }

    fn observe(&mut self, viewer: &Viewer) {
        self.camera = viewer.position;
        let camera_sqr = self.camera.length_squared();
        let radius_sqr = self.radius * self.radius;
        self.vis_sphere_sqr = (camera_sqr + (self.max_radius * self.max_radius - 2.0 * radius_sqr))
            * f64::from(self.settings.vis_sphere_radius_mod);
        self.frustum = match (self.settings.lod_mode_behind_camera, viewer.view_projection) {
            (LodModeBehindCam::NotComputed, Some(view_proj)) => {
                Some(Frustum::from_view_projection(&view_proj))
            }
            _ => None,
        };
    }

    fn viewport_changed(&mut self, viewer: &Viewer) -> bool {
        let threshold = f64::from(self.settings.recompute_quad_distances_threshold);
        let changed = match self.last_view {
            None => true,
            Some((position, rotation)) => {
                (viewer.position - position).length_squared() > threshold * threshold
                    || (viewer.rotation != rotation
                        && self.settings.lod_mode_behind_camera == LodModeBehindCam::NotComputed)
            }
        };
        if changed {
            self.last_view = Some((viewer.position, viewer.rotation));
        }
        changed
    }

    fn update_distances(&mut self, changed: bool) {
        if changed {
            if self.settings.update_all_quads {
                self.full_distance_pass();
            } else if self.distance_pass.is_some() {
                tracing::warn!(
                    "Viewport changed before the previous distance pass finished, updating all {} quads now",
                    self.arena.len()
                );
                self.sync_fallbacks += 1;
                self.distance_pass = None;
                self.full_distance_pass();
            } else {
                self.distance_pass = Some(DistancePass {
                    handles: self.arena.handles(),
                    cursor: 0,
                });
            }
        }

        let Some(mut pass) = self.distance_pass.take() else {
            return;
        };
        let end = (pass.cursor + self.settings.max_quads_to_update).min(pass.handles.len());
        for i in pass.cursor..end {
            self.update_distance(pass.handles[i]);
        }
        pass.cursor = end;
        if pass.cursor < pass.handles.len() {
            self.distance_pass = Some(pass);
        }
    }

    fn full_distance_pass(&mut self) {
        for handle in self.arena.handles() {
            self.update_distance(handle);
        }
    }

    fn retry_combines(&mut self) {
        for handle in std::mem::take(&mut self.combine_retry) {
            self.update_distance(handle);
        }
    }

    // --- Mesh jobs ---

    fn request_mesh(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        let geometry = QuadGeometry {
            path: quad.path.clone(),
            patch: quad.patch,
            edges: quad.edges,
        };
        let ticket = MeshJobTicket {
            slot: handle.index,
            generation: handle.generation,
            job: self.next_job,
        };
        self.next_job += 1;

        if let Err(request) = self.pipeline.submit(MeshBuildRequest { ticket, geometry }) {
            tracing::debug!(
                "Mesh queue full, building {} on the main thread",
                request.geometry.path
            );
            let mesh = self.pipeline.build_now(&request.geometry);
            self.deferred.push(MeshBuildResult {
                ticket,
                path: request.geometry.path,
                mesh,
            });
        }
        if let Some(quad) = self.arena.get_mut(handle) {
            quad.pending_job = Some(ticket);
        }
    }

    fn apply_results(&mut self) {
        let mut results = std::mem::take(&mut self.deferred);
        results.extend(self.pipeline.drain_results());
        for result in results {
            self.apply_result(result);
        }
    }

    fn apply_result(&mut self, result: MeshBuildResult) {
        let handle = QuadHandle {
            index: result.ticket.slot,
            generation: result.ticket.generation,
        };
        let Some(quad) = self
            .arena
            .get_mut(handle)
            .filter(|q| q.pending_job == Some(result.ticket))
        else {
            self.stale_results += 1;
            tracing::debug!(
                "Discarding stale mesh for {} (job {})",
                result.path,
                result.ticket.job
            );
            return;
        };
        quad.pending_job = None;

        match result.mesh {
            Ok(mesh) => self.apply_mesh(handle, mesh),
            Err(e) => {
                self.failed_builds += 1;
                tracing::warn!(
                    "Mesh build for {} failed: {e}, retrying on the main thread",
                    result.path
                );
                quad.edges_cache = EdgeConfiguration::ALL;
                let geometry = QuadGeometry {
                    path: quad.path.clone(),
                    patch: quad.patch,
                    edges: quad.edges,
                };
                match self.pipeline.build_now(&geometry) {
                    Ok(mesh) => self.apply_mesh(handle, mesh),
                    Err(e) => {
                        tracing::error!("Mesh rebuild for {} failed: {e}", result.path);
                        self.abort_parent_split(handle);
                    }
                }
            }
        }
    }

    fn apply_mesh(&mut self, handle: QuadHandle, mut mesh: MeshData) {
        let Some(quad) = self.arena.get_mut(handle) else {
            return;
        };
        // Adjacency may have changed while the job ran.
        mesh.set_edges(quad.edges);
        quad.edges_cache = quad.edges;
        if let Some(proxy) = quad.render_proxy {
            self.backend.set_mesh(proxy, &mesh);
        }
        quad.mesh = Some(mesh);
        quad.initialized = true;
        tracing::debug!("{} initialized", quad.path);
        self.update_distance(handle);
    }

    // --- Distances and visibility ---

    fn update_distance(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        let measured = quad.mesh.as_ref().filter(|_| quad.initialized).map(|mesh| {
            let bounds = Aabb::new(
                mesh.offset + mesh.bounds_min.as_dvec3(),
                mesh.offset + mesh.bounds_max.as_dvec3(),
            );
            let distance_sqr = bounds.distance_sqr(self.camera);
            (distance_sqr as f32, self.is_visible(&bounds, distance_sqr))
        });
        let Some((distance_sqr, visible)) = measured else {
            self.sync_proxy(handle);
            return;
        };

        let level = quad.level() as usize;
        let has_split = quad.has_split;
        let is_splitting = quad.is_splitting;
        if let Some(quad) = self.arena.get_mut(handle) {
            quad.distance_sqr = distance_sqr;
            quad.visible = visible;
        }

        if let Some(&detail) = self.settings.detail_distances.get(level) {
            if !has_split && self.split_wanted(handle) {
                self.enqueue_split(handle, distance_sqr, false);
            }

            if distance_sqr > detail * detail || !visible {
                if !is_splitting {
                    self.split_queue.withdraw(handle);
                }
                if has_split
                    && !is_splitting
                    && !self.combine(handle)
                    && !self.combine_retry.contains(&handle)
                {
                    self.combine_retry.push(handle);
                }
            }
        }

        self.sync_proxy(handle);
    }

    /// Close enough, visible and rough enough to split, judged on the last
    /// measured distance.
    fn split_wanted(&self, handle: QuadHandle) -> bool {
        let Some(quad) = self.arena.get(handle) else {
            return false;
        };
        let level = quad.level() as usize;
        let Some(&detail) = self.settings.detail_distances.get(level) else {
            return false;
        };
        let msd_ok = !self.settings.calculate_msds
            || quad.mesh.as_ref().is_some_and(|mesh| {
                mesh.msd >= self.settings.detail_msds.get(level).copied().unwrap_or(0.0)
            });
        quad.initialized && quad.visible && quad.distance_sqr < detail * detail && msd_ok
    }

    fn is_visible(&self, bounds: &Aabb, distance_sqr: f64) -> bool {
        if distance_sqr > self.vis_sphere_sqr {
            return false;
        }
        match &self.frustum {
            Some(frustum) => {
                frustum.is_visible(bounds, f64::from(self.settings.behind_camera_extra_range))
            }
            None => true,
        }
    }

    // --- Render proxies ---

    /// Give `handle` a proxy if it should be drawn, or take it away if not.
    fn sync_proxy(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        let (proxy, visible, has_split) = (quad.render_proxy, quad.visible, quad.has_split);
        let wants = quad.initialized && visible && !has_split;
        match proxy {
            None if wants && self.parent_ready(handle) => self.acquire_proxy(handle),
            Some(_) if !visible || has_split => self.release_proxy(handle),
            _ => {}
        }
    }

    fn acquire_proxy(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        let Some(mesh) = quad.mesh.as_ref() else {
            return;
        };
        let desc = ProxyDesc {
            path: &quad.path,
            origin: self.origin + mesh.offset,
            mesh,
            collider: self
                .settings
                .generate_colliders
                .get(quad.level() as usize)
                .copied()
                .unwrap_or(false),
        };
        let proxy = self.proxies.acquire(&mut self.backend, &desc);
        if let Some(quad) = self.arena.get_mut(handle) {
            quad.render_proxy = Some(proxy);
        }
    }

    fn release_proxy(&mut self, handle: QuadHandle) {
        let Some(proxy) = self
            .arena
            .get_mut(handle)
            .and_then(|quad| quad.render_proxy.take())
        else {
            return;
        };
        self.proxies.release(&mut self.backend, proxy);
    }

    // --- Adjacency ---

    /// The quad at `path`, or the closest existing ancestor of it.
    fn resolve_neighbor(&self, path: &QuadPath) -> Option<QuadHandle> {
        (0..=MAX_NEIGHBOR_TRIMS)
            .map_while(|trim| path.truncated(trim))
            .find_map(|candidate| self.arena.find(candidate.as_str()))
    }

    fn level_of(&self, handle: QuadHandle) -> Option<u8> {
        self.arena.get(handle).map(Quad::level)
    }

    /// Re-resolve neighbors and edge fans. Starts a mesh build when an
    /// unbuilt quad's edges change, or swaps index variants on a built one.
    fn refresh_neighbors(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get_mut(handle) else {
            return;
        };
        if quad.neighbor_paths.is_none() {
            quad.neighbor_paths = Some(neighbor_paths(&quad.path));
        }
        let Some(paths) = quad.neighbor_paths.clone() else {
            return;
        };
        let level = quad.level();

        let mut neighbors = [None; 4];
        let mut edges = EdgeConfiguration::NONE;
        for direction in Direction::ALL {
            let i = direction.index();
            match self.resolve_neighbor(&paths[i]) {
                Some(neighbor) => {
                    neighbors[i] = Some(neighbor);
                    let coarser = self.level_of(neighbor).is_some_and(|n| n + 1 == level);
                    edges.set(direction, coarser);
                }
                None => tracing::warn!(
                    "Neighbor {} ({direction:?}) not found within {} levels",
                    paths[i],
                    MAX_NEIGHBOR_TRIMS
                ),
            }
        }

        let Some(quad) = self.arena.get_mut(handle) else {
            return;
        };
        quad.neighbors = neighbors;
        quad.edges = edges;
        if edges == quad.edges_cache {
            return;
        }
        tracing::debug!("{}: edges {} -> {}", quad.path, quad.edges_cache, edges);
        quad.edges_cache = edges;

        if !quad.initialized {
            if quad.pending_job.is_none() {
                self.request_mesh(handle);
            }
        } else if let Some(mesh) = quad.mesh.as_mut() {
            mesh.set_edges(edges);
            if let Some(proxy) = quad.render_proxy {
                self.backend.set_mesh(proxy, mesh);
            }
        }
    }

    /// Refresh the neighbors of every quad adjacent to `handle`.
    fn update_neighbors(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        let paths = paths_around(quad);
        let adjacent: Vec<QuadHandle> =
            paths.iter().filter_map(|p| self.resolve_neighbor(p)).collect();
        for neighbor in adjacent {
            self.refresh_subtree(neighbor);
        }
    }

    fn refresh_subtree(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        if let Some(children) = quad.children {
            for child in children {
                self.refresh_subtree(child);
            }
        }
        self.refresh_neighbors(handle);
        self.update_distance(handle);
    }

    // --- Split / combine ---

    fn parent_ready(&self, handle: QuadHandle) -> bool {
        let parent = self.arena.get(handle).and_then(|q| q.parent);
        match parent.and_then(|p| self.arena.get(p)) {
            Some(parent) => parent.has_split && !parent.is_splitting,
            None => true,
        }
    }

    /// Every same-level neighbor exists, so splitting keeps adjacent
    /// leaves within one level of each other.
    fn can_split(&self, handle: QuadHandle) -> bool {
        let Some(quad) = self.arena.get(handle) else {
            return false;
        };
        let level = quad.level();
        paths_around(quad).iter().all(|p| {
            self.resolve_neighbor(p)
                .and_then(|n| self.level_of(n))
                .is_some_and(|n| n >= level)
        })
    }

    /// Neighbors one level coarser than `handle`. They must split first.
    fn coarser_neighbors(&self, handle: QuadHandle) -> Vec<QuadHandle> {
        let Some(quad) = self.arena.get(handle) else {
            return Vec::new();
        };
        let level = quad.level();
        paths_around(quad)
            .iter()
            .filter_map(|p| self.resolve_neighbor(p))
            .filter(|&n| self.level_of(n).is_some_and(|n| n < level))
            .collect()
    }

    /// Queue `handle` for splitting, along with any coarser neighbors that
    /// have to split before it can.
    fn enqueue_split(&mut self, handle: QuadHandle, distance_sqr: f32, forced: bool) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        if !quad.initialized
            || quad.has_split
            || quad.is_splitting
            || quad.split_failed
            || !self.parent_ready(handle)
        {
            return;
        }
        let level = quad.level();
        self.split_queue.push(handle, level, distance_sqr, forced);
        for blocker in self.coarser_neighbors(handle) {
            self.enqueue_split(blocker, distance_sqr, true);
        }
    }

    /// No same-level neighbor has a child that is split, splitting or
    /// waiting to split.
    fn can_combine(&self, handle: QuadHandle) -> bool {
        let Some(quad) = self.arena.get(handle) else {
            return false;
        };
        paths_around(quad)
            .iter()
            .filter_map(|p| self.arena.find(p.as_str()))
            .filter_map(|n| self.arena.get(n).and_then(|n| n.children))
            .flatten()
            .all(|c| {
                self.arena
                    .get(c)
                    .is_none_or(|child| !child.has_split && !child.is_splitting)
                    && !self.split_wanted(c)
            })
    }

    fn service_splits(&mut self) {
        for handle in std::mem::take(&mut self.splitting) {
            let Some(quad) = self.arena.get(handle) else {
                continue;
            };
            if !quad.is_splitting {
                continue;
            }
            let ready = quad.children.is_some_and(|children| {
                children
                    .iter()
                    .all(|c| self.arena.get(*c).is_some_and(|c| c.initialized))
            });
            if ready {
                self.finish_split(handle);
            } else {
                self.splitting.push(handle);
            }
        }

        // Blocked entries are skipped without taking one of the split slots.
        let limit = self.settings.quads_splitting_simultaneously;
        let mut running = 0;
        for handle in self.split_queue.ordered() {
            if running >= limit {
                break;
            }
            let Some(quad) = self.arena.get(handle) else {
                self.split_queue.remove(handle);
                continue;
            };
            if quad.has_split || quad.split_failed {
                self.split_queue.remove(handle);
                continue;
            }
            if quad.is_splitting || self.split_queue.is_started(handle) {
                running += 1;
                continue;
            }
            if !self.parent_ready(handle) {
                continue;
            }
            if !self.can_split(handle) {
                let distance_sqr = quad.distance_sqr;
                for blocker in self.coarser_neighbors(handle) {
                    self.enqueue_split(blocker, distance_sqr, true);
                }
                continue;
            }
            self.split_queue.mark_started(handle);
            self.start_split(handle);
            running += 1;
        }
    }

    fn start_split(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get_mut(handle) else {
            return;
        };
        if quad.has_split || quad.is_splitting {
            return;
        }
        quad.is_splitting = true;
        let path = quad.path.clone();

        let created: Vec<QuadHandle> = (0..4)
            .filter_map(|q| self.arena.insert(path.child(q), Some(handle)))
            .collect();
        let Ok(children) = <[QuadHandle; 4]>::try_from(created.as_slice()) else {
            tracing::error!("Cannot split {path}: a child path is already live");
            for child in created {
                self.arena.remove(child);
            }
            if let Some(quad) = self.arena.get_mut(handle) {
                quad.is_splitting = false;
            }
            self.split_queue.remove(handle);
            return;
        };

        if let Some(quad) = self.arena.get_mut(handle) {
            quad.children = Some(children);
        }
        self.splitting.push(handle);
        for child in children {
            self.refresh_neighbors(child);
        }
        tracing::debug!("Splitting {path}");
    }

    fn finish_split(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get_mut(handle) else {
            return;
        };
        quad.is_splitting = false;
        quad.has_split = true;
        let children = quad.children;
        let path = quad.path.clone();
        self.split_queue.remove(handle);

        for child in children.into_iter().flatten() {
            self.refresh_neighbors(child);
            self.update_distance(child);
        }
        self.release_proxy(handle);
        self.update_neighbors(handle);
        tracing::debug!("Split {path} complete");
    }

    /// Give up on the split `child` belongs to. The parent keeps drawing its
    /// own mesh and is not queued for splitting again.
    fn abort_parent_split(&mut self, child: QuadHandle) {
        let Some(parent) = self.arena.get(child).and_then(|q| q.parent) else {
            return;
        };
        let Some(quad) = self.arena.get_mut(parent) else {
            return;
        };
        if !quad.is_splitting {
            return;
        }
        quad.is_splitting = false;
        quad.split_failed = true;
        let children = quad.children.take();
        let path = quad.path.clone();
        for child in children.into_iter().flatten() {
            self.remove_subtree(child);
        }
        self.split_queue.remove(parent);
        self.splitting.retain(|&h| h != parent);
        self.update_neighbors(parent);
        self.sync_proxy(parent);
        tracing::warn!("Split of {path} abandoned, a child mesh could not be built");
    }

    /// Drop the children of a split quad. Returns false when the quad is not
    /// split or a neighbor is still too fine.
    fn combine(&mut self, handle: QuadHandle) -> bool {
        let Some(quad) = self.arena.get(handle) else {
            return false;
        };
        if !quad.has_split || quad.is_splitting {
            return false;
        }
        if !self.can_combine(handle) {
            tracing::debug!("Combine of {} deferred, a neighbor is finer", quad.path);
            return false;
        }

        let Some(quad) = self.arena.get_mut(handle) else {
            return false;
        };
        quad.has_split = false;
        let children = quad.children.take();
        let path = quad.path.clone();
        for child in children.into_iter().flatten() {
            self.remove_subtree(child);
        }
        self.update_neighbors(handle);
        tracing::debug!("Combined {path}");
        true
    }

    /// Remove a quad and its descendants, deepest first.
    fn remove_subtree(&mut self, handle: QuadHandle) {
        let Some(quad) = self.arena.get(handle) else {
            return;
        };
        if let Some(children) = quad.children {
            for child in children {
                self.remove_subtree(child);
            }
        }
        self.release_proxy(handle);
        self.split_queue.remove(handle);
        self.arena.remove(handle);
    }

    /// Split the quad at `path` now, bypassing distance checks and the
    /// split queue. Returns false if it cannot split.
    pub fn force_split(&mut self, path: &str) -> bool {
        let Some(handle) = self.arena.find(path) else {
            return false;
        };
        let ready = self
            .arena
            .get(handle)
            .is_some_and(|q| q.initialized && !q.has_split && !q.is_splitting);
        if !ready || !self.can_split(handle) {
            return false;
        }
        self.start_split(handle);
        true
    }

    /// Combine the quad at `path` now if it is split and its neighbors allow it.
    pub fn force_combine(&mut self, path: &str) -> bool {
        let Some(handle) = self.arena.find(path) else {
            return false;
        };
        let combined = self.combine(handle);
        if combined {
            self.sync_proxy(handle);
        }
        combined
    }

    // --- Accessors ---

    /// Move the planet. Live proxies are repositioned.
    pub fn set_origin(&mut self, origin: DVec3) {
        if origin == self.origin {
            return;
        }
        self.origin = origin;
        for quad in self.arena.iter() {
            let (Some(proxy), Some(mesh)) = (quad.render_proxy, quad.mesh.as_ref()) else {
                continue;
            };
            let desc = ProxyDesc {
                path: &quad.path,
                origin: origin + mesh.offset,
                mesh,
                collider: self
                    .settings
                    .generate_colliders
                    .get(quad.level() as usize)
                    .copied()
                    .unwrap_or(false),
            };
            self.backend.update_render_proxy(proxy, &desc);
        }
    }

    #[must_use]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The live quad at `path`.
    #[must_use]
    pub fn quad(&self, path: &str) -> Option<&Quad> {
        self.arena.find(path).and_then(|h| self.arena.get(h))
    }

    #[must_use]
    pub fn quad_by_handle(&self, handle: QuadHandle) -> Option<&Quad> {
        self.arena.get(handle)
    }

    #[must_use]
    pub fn handle_of(&self, path: &str) -> Option<QuadHandle> {
        self.arena.find(path)
    }

    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.arena.iter()
    }

    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn stats(&self) -> LodStats {
        let mut stats = LodStats {
            quads: self.arena.len(),
            splitting: self.splitting.len(),
            queued_splits: self.split_queue.len(),
            pooled_quads: self.arena.pooled(),
            pooled_proxies: self.proxies.len(),
            stale_results: self.stale_results,
            failed_builds: self.failed_builds,
            sync_fallbacks: self.sync_fallbacks,
            distance_pass_active: self.distance_pass.is_some(),
            ..LodStats::default()
        };
        for quad in self.arena.iter() {
            stats.leaves += usize::from(quad.children.is_none());
            stats.proxies += usize::from(quad.render_proxy.is_some());
            stats.pending_jobs += usize::from(quad.pending_job.is_some());
            stats.max_level = stats.max_level.max(quad.level());
        }
        stats
    }
}

impl<B: RenderBackend> Drop for PlanetLodManager<B> {
    fn drop(&mut self) {
        for handle in self.arena.handles() {
            if let Some(proxy) = self.arena.get_mut(handle).and_then(|q| q.render_proxy.take()) {
                self.backend.release_render_proxy(proxy);
            }
        }
        self.proxies.clear(&mut self.backend);
    }
}

fn paths_around(quad: &Quad) -> [QuadPath; 4] {
    match &quad.neighbor_paths {
        Some(paths) => paths.clone(),
        None => neighbor_paths(&quad.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use glam::{Mat4, Vec3};
    use quadsphere_cubesphere::QuadPatch;
    use std::collections::HashSet;

    const EPSILON: f64 = 1e-9;

    fn small_planet() -> Config {
        let mut config = Config::default();
        config.planet.radius = 1000.0;
        config.planet.detail_distances = vec![1500.0, 600.0, 250.0];
        config.planet.detail_msds = vec![0.0; 3];
        config.planet.generate_colliders = vec![false, false, false, true];
        config.planet.recompute_quad_distances_threshold = 1.0;
        config.planet.quads_splitting_simultaneously = 4;
        config.mesh.worker_threads = 0;
        config
    }

    fn manager(config: &Config) -> PlanetLodManager<HeadlessBackend> {
        PlanetLodManager::new(config, HeadlessBackend::new()).unwrap()
    }

    fn far_viewer() -> Viewer {
        Viewer::at(DVec3::new(0.0, 0.0, 1.0e6))
    }

    fn path_of(m: &PlanetLodManager<HeadlessBackend>, handle: Option<QuadHandle>) -> String {
        handle
            .and_then(|h| m.quad_by_handle(h))
            .map(|q| q.path().as_str().to_string())
            .unwrap_or_default()
    }

    fn assert_invariants(m: &PlanetLodManager<HeadlessBackend>) {
        let paths: HashSet<&str> = m.quads().map(|q| q.path().as_str()).collect();
        assert_eq!(paths.len(), m.quad_count(), "duplicate live paths");

        for quad in m.quads() {
            let path = quad.path();
            let handle = m.handle_of(path.as_str()).unwrap();
            assert_eq!(m.quad_by_handle(handle).map(|q| q.path()), Some(path));

            if quad.has_split() {
                assert!(quad.render_proxy().is_none(), "{path} is split but still rendered");
            }
            if let Some(children) = quad.children() {
                for n in neighbor_paths(path) {
                    assert!(
                        m.quad(n.as_str()).is_some(),
                        "{path} is subdivided but its neighbor {n} does not exist"
                    );
                }
                for child in children {
                    let child = m.quad_by_handle(child).expect("child handle must be live");
                    assert_eq!(child.level(), quad.level() + 1);
                    assert_eq!(child.parent(), Some(handle));
                }
            } else {
                // Leaves: the closest existing neighbor is at most one level coarser.
                for n in neighbor_paths(path) {
                    let found = (0..=path.level() as usize)
                        .filter_map(|trim| n.truncated(trim))
                        .find_map(|p| m.quad(p.as_str()))
                        .expect("root faces always exist");
                    assert!(
                        found.level() + 1 >= quad.level(),
                        "{path} (level {}) borders {} (level {})",
                        quad.level(),
                        found.path(),
                        found.level()
                    );
                }
            }
        }

        let proxied = m.quads().filter(|q| q.render_proxy().is_some()).count();
        assert_eq!(m.backend().visible_count(), proxied);
    }

    #[test]
    fn test_root_init() {
        let mut config = Config::default();
        config.mesh.worker_threads = 0;
        config.planet.vis_sphere_radius_mod = 2.0;
        let mut m = manager(&config);

        assert_eq!(m.quad_count(), 6);
        let mut paths: Vec<&str> = m.quads().map(|q| q.path().as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["01", "02", "03", "12", "13", "21"]);
        assert!(m.quads().all(|q| q.level() == 0 && q.has_pending_job()));

        m.tick(&far_viewer());
        for quad in m.quads() {
            assert!(quad.is_initialized(), "{} not initialized", quad.path());
            assert!(quad.render_proxy().is_some(), "{} has no proxy", quad.path());
            assert_eq!(quad.edges(), EdgeConfiguration::NONE);
        }
        assert_eq!(m.backend().visible_count(), 6);

        let forward = m.quad("03").unwrap();
        let neighbors = forward.neighbors();
        assert_eq!(path_of(&m, neighbors[Direction::Right.index()]), "12");
        assert_eq!(path_of(&m, neighbors[Direction::Left.index()]), "02");
        assert_eq!(path_of(&m, neighbors[Direction::Down.index()]), "21");
        assert_eq!(path_of(&m, neighbors[Direction::Up.index()]), "01");
        assert_invariants(&m);
    }

    #[test]
    fn test_single_split() {
        let mut config = Config::default();
        config.mesh.worker_threads = 0;
        config.planet.vis_sphere_radius_mod = 2.0;
        let mut m = manager(&config);
        m.tick(&far_viewer());

        assert!(m.force_split("03"));
        assert!(!m.force_split("03"), "a splitting quad cannot split again");
        assert!(m.quad("03").unwrap().is_splitting());
        assert!(m.quad("03").unwrap().render_proxy().is_some(), "parent renders until children are ready");

        m.tick(&far_viewer());
        let parent = m.quad("03").unwrap();
        assert!(parent.has_split() && !parent.is_splitting());
        assert!(parent.render_proxy().is_none(), "parent proxy must be released");
        assert_eq!(m.quad_count(), 10);

        for q in 0..4u8 {
            let path = format!("03{q}");
            let child = m.quad(&path).unwrap_or_else(|| panic!("missing child {path}"));
            assert_eq!(child.level(), 1);
            assert!((child.scale() - parent.scale() / 2.0).abs() < EPSILON);
            assert!(child.is_initialized());
            assert!(child.render_proxy().is_some());
        }
        // Top-left child borders the coarser left and up roots.
        assert_eq!(
            m.quad("030").unwrap().edges(),
            EdgeConfiguration::new(false, true, false, true)
        );
        assert!(!m.backend().visible_paths().contains(&"03".to_string()));
        assert_eq!(m.backend().counts().hidden, 1);
        assert!(!m.force_split("030"), "the left and up roots are still coarser");
        assert_invariants(&m);
    }

    #[test]
    fn test_split_combine_idempotence() {
        let mut config = Config::default();
        config.mesh.worker_threads = 0;
        config.planet.vis_sphere_radius_mod = 2.0;
        let mut m = manager(&config);
        m.tick(&far_viewer());

        let before = m.quad("03").unwrap().mesh().unwrap().positions.clone();
        let visible_before = m.backend().visible_paths();

        assert!(!m.force_combine("03"), "an unsplit quad cannot combine");
        assert!(m.force_split("03"));
        m.tick(&far_viewer());
        assert!(m.quad("03").unwrap().has_split());

        assert!(m.force_combine("03"));
        assert_eq!(m.quad_count(), 6);
        let parent = m.quad("03").unwrap();
        assert!(!parent.has_split() && parent.children().is_none());
        assert_eq!(parent.edges(), EdgeConfiguration::NONE);
        assert_eq!(parent.mesh().unwrap().positions, before);
        assert!(parent.render_proxy().is_some());
        assert_eq!(m.backend().visible_paths(), visible_before);
        assert!(m.quad("031").is_none());
        assert_invariants(&m);
    }

    #[test]
    fn test_stale_result_discarded() {
        let mut config = small_planet();
        config.planet.detail_distances = vec![];
        config.planet.detail_msds = vec![];
        let mut m = manager(&config);

        // Supersede the root's first job; its result must be ignored.
        let handle = m.handle_of("13").unwrap();
        m.request_mesh(handle);
        m.tick(&far_viewer());

        let stats = m.stats();
        assert_eq!(stats.stale_results, 1);
        assert_eq!(stats.pending_jobs, 0);
        assert!(m.quads().all(Quad::is_initialized));
    }

    #[test]
    fn test_removed_quad_result_discarded() {
        let mut config = Config::default();
        config.mesh.worker_threads = 0;
        let mut m = manager(&config);
        m.tick(&far_viewer());

        assert!(m.force_split("03"));
        let child = m.handle_of("033").unwrap();
        m.remove_subtree(child);
        m.tick(&far_viewer());

        assert!(m.quad("033").is_none());
        assert_eq!(m.stats().stale_results, 1);
    }

    struct SpikeAtForward;

    impl HeightSource for SpikeAtForward {
        fn height(&self, dir: DVec3) -> f32 {
            if dir.z > 0.99 { f32::NAN } else { 0.0 }
        }
    }

    #[test]
    fn test_failed_build_leaves_quad_for_retry() {
        let config = small_planet();
        let mut m =
            PlanetLodManager::with_height_source(&config, HeadlessBackend::new(), Arc::new(SpikeAtForward))
                .unwrap();
        m.tick(&far_viewer());

        let forward = m.quad("03").unwrap();
        assert!(!forward.is_initialized());
        assert!(!forward.has_pending_job());
        assert_eq!(forward.edges_cache, EdgeConfiguration::ALL);
        assert_eq!(m.stats().failed_builds, 1);
        assert_eq!(m.quads().filter(|q| q.is_initialized()).count(), 5);
    }

    #[test]
    fn test_time_slice_fallback() {
        let mut config = small_planet();
        config.planet.max_quads_to_update = 1;
        let mut m = manager(&config);

        m.tick(&far_viewer());
        assert!(m.stats().distance_pass_active, "six quads need six ticks at one per tick");

        m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 9.0e5)));
        let stats = m.stats();
        assert_eq!(stats.sync_fallbacks, 1);
        assert!(!stats.distance_pass_active);

        // Without a viewport change the pass is never restarted.
        m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 9.0e5)));
        assert!(!m.stats().distance_pass_active);
    }

    #[test]
    fn test_update_all_quads_never_slices() {
        let mut config = small_planet();
        config.planet.max_quads_to_update = 1;
        config.planet.update_all_quads = true;
        let mut m = manager(&config);

        m.tick(&far_viewer());
        m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 9.0e5)));
        let stats = m.stats();
        assert_eq!(stats.sync_fallbacks, 0);
        assert!(!stats.distance_pass_active);
    }

    #[test]
    fn test_descend_and_ascend_keeps_invariants() {
        let config = small_planet();
        let mut m = manager(&config);

        for i in 0..=60 {
            let height = 3000.0 - (3000.0 - 1020.0) * f64::from(i) / 60.0;
            m.tick(&Viewer::at(DVec3::new(0.0, 0.0, height)));
            assert_invariants(&m);
        }
        for _ in 0..60 {
            m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 1020.0)));
            assert_invariants(&m);
        }

        let stats = m.stats();
        assert_eq!(stats.max_level, 3, "camera 20 units above the surface reaches the last level");
        assert!(stats.leaves > 6);
        // Faces bordering the camera's face split so its edge quads can.
        for root in ["01", "02", "12", "21"] {
            assert!(m.quad(root).unwrap().has_split(), "{root} should have split");
        }
        assert!(m.quad("13").unwrap().children().is_none());
        for quad in m.quads().filter(|q| q.render_proxy().is_some()) {
            let proxy = m.backend().proxy(quad.render_proxy().unwrap()).unwrap();
            assert_eq!(proxy.collider, quad.level() == 3, "{}", quad.path());
        }

        for i in 0..=20 {
            let height = 1020.0 + 1.0e5 * f64::from(i) / 20.0;
            m.tick(&Viewer::at(DVec3::new(0.0, 0.0, height)));
            assert_invariants(&m);
        }
        for _ in 0..20 {
            m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 1.0e5 + 1020.0)));
            assert_invariants(&m);
        }
        assert_eq!(m.quad_count(), 6, "everything should combine back to the roots");
        assert!(m.stats().pooled_quads > 0);
    }

    #[test]
    fn test_msd_gate_blocks_smooth_terrain() {
        let mut config = small_planet();
        config.planet.calculate_msds = true;
        config.planet.detail_msds = vec![1.0; 3];
        let mut m = manager(&config);
        for _ in 0..5 {
            m.tick(&Viewer::at(DVec3::new(0.0, 0.0, 1020.0)));
        }
        assert_eq!(m.quad_count(), 6, "flat terrain never passes the MSD gate");
    }

    #[test]
    fn test_frustum_culling_behind_camera() {
        let mut config = small_planet();
        config.planet.lod_mode_behind_camera = LodModeBehindCam::NotComputed;
        config.planet.detail_distances = vec![];
        config.planet.detail_msds = vec![];
        let mut m = manager(&config);

        let eye = Vec3::new(0.0, 0.0, 3000.0);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 1.0e5);
        let toward = Viewer::at(eye.as_dvec3())
            .with_view_projection(Quat::IDENTITY, proj * Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y));
        m.tick(&toward);
        assert!(m.quad("03").unwrap().render_proxy().is_some());
        assert!(m.quad("13").unwrap().render_proxy().is_none(), "far side is below the horizon");

        let away = Viewer::at(eye.as_dvec3()).with_view_projection(
            Quat::from_rotation_y(std::f32::consts::PI),
            proj * Mat4::look_at_rh(eye, eye + Vec3::Z, Vec3::Y),
        );
        m.tick(&away);
        assert_eq!(m.backend().visible_count(), 0);
        assert_invariants(&m);
    }

    #[test]
    fn test_set_origin_moves_proxies() {
        let mut config = small_planet();
        config.planet.vis_sphere_radius_mod = 2.0;
        let mut m = manager(&config);
        m.tick(&far_viewer());

        let origin = DVec3::new(5.0, -3.0, 100.0);
        m.set_origin(origin);
        let quad = m.quad("01").unwrap();
        let proxy = m.backend().proxy(quad.render_proxy().unwrap()).unwrap();
        let expected = origin + quad.mesh().unwrap().offset;
        assert!((proxy.origin - expected).length() < EPSILON);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = small_planet();
        config.planet.generate_colliders = vec![];
        assert!(matches!(
            PlanetLodManager::new(&config, HeadlessBackend::new()),
            Err(LodError::Config(_))
        ));
    }

    /// Fails at a single vertex that only `0321` samples: one grid step right
    /// of its center, which no coarser mesh or neighbor ring lands on.
    struct HoleInQuad {
        dir: DVec3,
    }

    impl HoleInQuad {
        fn new() -> Self {
            let patch = QuadPatch::from_path(&QuadPath::parse("0321").unwrap());
            Self {
                dir: patch.cube_point(2.0 / 32.0, 0.0).normalize(),
            }
        }
    }

    impl HeightSource for HoleInQuad {
        fn height(&self, dir: DVec3) -> f32 {
            if dir.normalize().dot(self.dir) > 1.0 - EPSILON { f32::NAN } else { 0.0 }
        }
    }

    #[test]
    fn test_failed_child_build_abandons_split() {
        let mut config = small_planet();
        config.planet.quads_splitting_simultaneously = 1;
        let mut m =
            PlanetLodManager::with_height_source(&config, HeadlessBackend::new(), Arc::new(HoleInQuad::new()))
                .unwrap();
        let viewer = Viewer::at(DVec3::new(0.0, 0.0, 1020.0));
        for _ in 0..200 {
            m.tick(&viewer);
            assert_invariants(&m);
        }

        let stats = m.stats();
        assert!(stats.failed_builds >= 1);
        assert_eq!(stats.splitting, 0, "an abandoned split must free its slot");

        let parent = m.quad("032").unwrap();
        assert!(parent.split_failed);
        assert!(!parent.is_splitting());
        assert!(parent.children().is_none());
        assert!(parent.render_proxy().is_some(), "the parent keeps drawing its own mesh");
        assert!(m.quad("0321").is_none());

        // The rest of the tree still refines around the hole.
        assert_eq!(stats.max_level, 3);
        assert!(m.quad("0312").is_some_and(|q| q.has_split()));
    }

    #[test]
    fn test_drop_releases_every_proxy() {
        let config = small_planet();
        let mut backend = HeadlessBackend::new();
        {
            let mut m = PlanetLodManager::new(&config, &mut backend).unwrap();
            m.tick(&far_viewer());
            assert!(m.force_split("03"));
            m.tick(&far_viewer());
            assert!(m.stats().pooled_proxies > 0);
            assert!(m.backend().live_count() > m.stats().proxies);
        }
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.counts().released, backend.counts().created);
    }

    #[test]
    fn test_neighbor_beyond_trim_limit_is_left_empty() {
        let config = small_planet();
        let mut m = manager(&config);
        // Only the roots exist, so every neighbor lookup from level 5 runs out
        // of trims before reaching a live quad.
        let handle = m
            .arena
            .insert(QuadPath::parse("0300000").unwrap(), None)
            .unwrap();
        m.refresh_neighbors(handle);

        let quad = m.quad_by_handle(handle).unwrap();
        assert_eq!(quad.neighbors(), [None; 4]);
        assert_eq!(quad.edges(), EdgeConfiguration::NONE);
        assert_eq!(m.quad_count(), 7);
    }
}
