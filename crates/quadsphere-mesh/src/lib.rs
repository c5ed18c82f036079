//! Quad mesh generation: the shared plane template, edge-fan index
//! variants for LOD stitching, displacement of a cube patch onto the
//! terrain surface, and the worker pool that builds meshes off the main
//! thread.

mod builder;
mod edge_fan;
mod error;
mod mesh_data;
mod pipeline;
mod template;

pub use builder::{MeshBuilder, QuadGeometry};
pub use edge_fan::{EdgeConfiguration, index_variant};
pub use error::MeshBuildError;
pub use mesh_data::{MeshData, TerrainVertex};
pub use pipeline::{MeshBuildPipeline, MeshBuildRequest, MeshBuildResult, MeshJobTicket};
pub use template::{EXTENDED_VERTICES, GRID_SIZE, GRID_VERTICES, grid_index};
