//! Interface to whatever draws the quads, plus a recording implementation
//! used headless.

use glam::DVec3;
use quadsphere_cubesphere::QuadPath;
use quadsphere_mesh::MeshData;
use rustc_hash::FxHashMap;

/// Opaque handle to a renderable object owned by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyHandle(pub u64);

/// Everything a backend needs to place and draw one quad.
#[derive(Clone, Copy, Debug)]
pub struct ProxyDesc<'a> {
    pub path: &'a QuadPath,
    /// World position of the mesh origin (planet position plus mesh offset).
    pub origin: DVec3,
    pub mesh: &'a MeshData,
    pub collider: bool,
}

/// Render-side operations the LOD manager drives. Called from the
/// manager's thread only.
pub trait RenderBackend {
    /// Create a new visible proxy.
    fn create_render_proxy(&mut self, desc: &ProxyDesc<'_>) -> ProxyHandle;
    /// Reuse a hidden proxy for `desc`: reposition, replace the mesh and show it.
    fn update_render_proxy(&mut self, proxy: ProxyHandle, desc: &ProxyDesc<'_>);
    /// Replace the mesh of a live proxy.
    fn set_mesh(&mut self, proxy: ProxyHandle, mesh: &MeshData);
    /// Hide a proxy so it can be reused later.
    fn hide_render_proxy(&mut self, proxy: ProxyHandle);
    /// Destroy a proxy.
    fn release_render_proxy(&mut self, proxy: ProxyHandle);
}

impl<B: RenderBackend + ?Sized> RenderBackend for &mut B {
    fn create_render_proxy(&mut self, desc: &ProxyDesc<'_>) -> ProxyHandle {
        (**self).create_render_proxy(desc)
    }

    fn update_render_proxy(&mut self, proxy: ProxyHandle, desc: &ProxyDesc<'_>) {
        (**self).update_render_proxy(proxy, desc);
    }

    fn set_mesh(&mut self, proxy: ProxyHandle, mesh: &MeshData) {
        (**self).set_mesh(proxy, mesh);
    }

    fn hide_render_proxy(&mut self, proxy: ProxyHandle) {
        (**self).hide_render_proxy(proxy);
    }

    fn release_render_proxy(&mut self, proxy: ProxyHandle) {
        (**self).release_render_proxy(proxy);
    }
}

/// Hidden proxies waiting for reuse.
#[derive(Debug)]
pub(crate) struct ProxyPool {
    hidden: Vec<ProxyHandle>,
    capacity: usize,
}

impl ProxyPool {
    pub(crate) const CAPACITY: usize = 30;

    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            hidden: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Show `desc` on a pooled proxy, or create one when the pool is empty.
    pub(crate) fn acquire<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        desc: &ProxyDesc<'_>,
    ) -> ProxyHandle {
        match self.hidden.pop() {
            Some(proxy) => {
                backend.update_render_proxy(proxy, desc);
                proxy
            }
            None => backend.create_render_proxy(desc),
        }
    }

    /// Park `proxy` in the pool, or destroy it when the pool is full.
    pub(crate) fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, proxy: ProxyHandle) {
        if self.hidden.len() < self.capacity {
            backend.hide_render_proxy(proxy);
            self.hidden.push(proxy);
        } else {
            backend.release_render_proxy(proxy);
        }
    }

    /// Destroy every pooled proxy.
    pub(crate) fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for proxy in self.hidden.drain(..) {
            backend.release_render_proxy(proxy);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hidden.len()
    }
}

/// State of one proxy in a [`HeadlessBackend`].
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessProxy {
    pub path: QuadPath,
    pub origin: DVec3,
    pub visible: bool,
    pub collider: bool,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Number of calls made to each backend operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendCounts {
    pub created: u64,
    pub updated: u64,
    pub meshes_set: u64,
    pub hidden: u64,
    pub released: u64,
}

/// Backend that only records what it is asked to do.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    proxies: FxHashMap<ProxyHandle, HeadlessProxy>,
    counts: BackendCounts,
    next_id: u64,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn proxy(&self, proxy: ProxyHandle) -> Option<&HeadlessProxy> {
        self.proxies.get(&proxy)
    }

    /// Proxies not destroyed yet, hidden ones included.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.proxies.len()
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.proxies.values().filter(|p| p.visible).count()
    }

    /// Paths currently shown, sorted.
    #[must_use]
    pub fn visible_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .proxies
            .values()
            .filter(|p| p.visible)
            .map(|p| p.path.as_str().to_string())
            .collect();
        paths.sort();
        paths
    }

    #[must_use]
    pub fn counts(&self) -> BackendCounts {
        self.counts
    }

    fn record(desc: &ProxyDesc<'_>) -> HeadlessProxy {
        HeadlessProxy {
            path: desc.path.clone(),
            origin: desc.origin,
            visible: true,
            collider: desc.collider,
            vertex_count: desc.mesh.vertex_count(),
            triangle_count: desc.mesh.triangle_count(),
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_render_proxy(&mut self, desc: &ProxyDesc<'_>) -> ProxyHandle {
        let handle = ProxyHandle(self.next_id);
        self.next_id += 1;
        self.proxies.insert(handle, Self::record(desc));
        self.counts.created += 1;
        handle
    }

    fn update_render_proxy(&mut self, proxy: ProxyHandle, desc: &ProxyDesc<'_>) {
        self.proxies.insert(proxy, Self::record(desc));
        self.counts.updated += 1;
    }

    fn set_mesh(&mut self, proxy: ProxyHandle, mesh: &MeshData) {
        if let Some(p) = self.proxies.get_mut(&proxy) {
            p.vertex_count = mesh.vertex_count();
            p.triangle_count = mesh.triangle_count();
        }
        self.counts.meshes_set += 1;
    }

    fn hide_render_proxy(&mut self, proxy: ProxyHandle) {
        if let Some(p) = self.proxies.get_mut(&proxy) {
            p.visible = false;
        }
        self.counts.hidden += 1;
    }

    fn release_render_proxy(&mut self, proxy: ProxyHandle) {
        self.proxies.remove(&proxy);
        self.counts.released += 1;
    }
}
