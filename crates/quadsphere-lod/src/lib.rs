//! Level-of-detail management for quadtree cube-sphere planets.
//!
//! [`PlanetLodManager`] owns the six root quads of one planet and, once per
//! [`tick`](PlanetLodManager::tick), splits quads the [`Viewer`] comes close
//! to and combines the ones it left behind. Meshes are built off-thread by
//! `quadsphere-mesh`; drawing goes through a [`RenderBackend`].
//!
//! Adjacent leaves never differ by more than one level. Splitting near a face
//! edge first splits the coarser quad across it.

mod arena;
mod backend;
mod error;
mod frustum;
mod manager;
mod quad;
mod split_queue;
mod viewer;

pub use arena::QuadHandle;
pub use backend::{
    BackendCounts, HeadlessBackend, HeadlessProxy, ProxyDesc, ProxyHandle, RenderBackend,
};
pub use error::LodError;
pub use frustum::{Aabb, Frustum, Intersection};
pub use manager::{LodStats, PlanetLodManager};
pub use quad::Quad;
pub use viewer::Viewer;
