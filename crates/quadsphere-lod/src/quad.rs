//! The per-quad record held by the arena.

use glam::DVec3;
use quadsphere_cubesphere::{FaceSide, QuadPatch, QuadPath, QuadPlane};
use quadsphere_mesh::{EdgeConfiguration, MeshData, MeshJobTicket};

use crate::arena::QuadHandle;
use crate::backend::ProxyHandle;

/// One node of the planet quadtree.
#[derive(Debug)]
pub struct Quad {
    pub(crate) path: QuadPath,
    pub(crate) patch: QuadPatch,
    pub(crate) parent: Option<QuadHandle>,
    pub(crate) children: Option<[QuadHandle; 4]>,
    /// Right, left, down, up. Validated against the arena before use.
    pub(crate) neighbors: [Option<QuadHandle>; 4],
    pub(crate) neighbor_paths: Option<[QuadPath; 4]>,
    pub(crate) edges: EdgeConfiguration,
    /// Configuration the current mesh (or pending build) was made for.
    pub(crate) edges_cache: EdgeConfiguration,
    pub(crate) mesh: Option<MeshData>,
    pub(crate) distance_sqr: f32,
    pub(crate) visible: bool,
    pub(crate) has_split: bool,
    pub(crate) is_splitting: bool,
    pub(crate) initialized: bool,
    /// A child mesh could not be built. Not queued for splitting again.
    pub(crate) split_failed: bool,
    pub(crate) render_proxy: Option<ProxyHandle>,
    pub(crate) pending_job: Option<MeshJobTicket>,
}

impl Quad {
    pub(crate) fn new(path: QuadPath, parent: Option<QuadHandle>) -> Self {
        Self {
            patch: QuadPatch::from_path(&path),
            path,
            parent,
            children: None,
            neighbors: [None; 4],
            neighbor_paths: None,
            edges: EdgeConfiguration::NONE,
            edges_cache: EdgeConfiguration::ALL,
            mesh: None,
            distance_sqr: f32::INFINITY,
            visible: false,
            has_split: false,
            is_splitting: false,
            initialized: false,
            split_failed: false,
            render_proxy: None,
            pending_job: None,
        }
    }

    /// Reinitialize a pooled record for `path`, keeping its allocations.
    pub(crate) fn reuse(&mut self, path: QuadPath, parent: Option<QuadHandle>) {
        self.patch = QuadPatch::from_path(&path);
        self.path = path;
        self.parent = parent;
    }

    /// Clear all state before the record goes back to the pool.
    pub(crate) fn reset(&mut self) {
        self.parent = None;
        self.children = None;
        self.neighbors = [None; 4];
        self.neighbor_paths = None;
        self.edges = EdgeConfiguration::NONE;
        self.edges_cache = EdgeConfiguration::ALL;
        self.mesh = None;
        self.distance_sqr = f32::INFINITY;
        self.visible = false;
        self.has_split = false;
        self.is_splitting = false;
        self.initialized = false;
        self.split_failed = false;
        self.render_proxy = None;
        self.pending_job = None;
    }

    #[must_use]
    pub fn path(&self) -> &QuadPath {
        &self.path
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.path.level()
    }

    #[must_use]
    pub fn plane(&self) -> QuadPlane {
        self.patch.root.plane()
    }

    #[must_use]
    pub fn side(&self) -> FaceSide {
        self.patch.root.side()
    }

    /// Patch center on the cube.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        self.patch.center
    }

    /// Half-width of the patch on the cube.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.patch.scale
    }

    #[must_use]
    pub fn patch(&self) -> &QuadPatch {
        &self.patch
    }

    #[must_use]
    pub fn parent(&self) -> Option<QuadHandle> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> Option<[QuadHandle; 4]> {
        self.children
    }

    /// Neighbor handles from the last adjacency update. May be stale.
    #[must_use]
    pub fn neighbors(&self) -> [Option<QuadHandle>; 4] {
        self.neighbors
    }

    #[must_use]
    pub fn edges(&self) -> EdgeConfiguration {
        self.edges
    }

    #[must_use]
    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    #[must_use]
    pub fn distance_sqr(&self) -> f32 {
        self.distance_sqr
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn has_split(&self) -> bool {
        self.has_split
    }

    #[must_use]
    pub fn is_splitting(&self) -> bool {
        self.is_splitting
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn render_proxy(&self) -> Option<ProxyHandle> {
        self.render_proxy
    }

    #[must_use]
    pub fn has_pending_job(&self) -> bool {
        self.pending_job.is_some()
    }
}
