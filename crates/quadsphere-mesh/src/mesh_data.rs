//! Displaced quad geometry and its GPU vertex layout.

use glam::{DVec3, Vec2, Vec3, Vec4};

use crate::edge_fan::{EdgeConfiguration, index_variant};

/// One interleaved vertex as uploaded by a renderer.
///
/// Layout (56 bytes total):
///   - `[0..12]`  position relative to the mesh offset
///   - `[12..24]` normal
///   - `[24..32]` uv
///   - `[32..40]` uv2, texture weights 4 and 5
///   - `[40..56]` color, texture weights 0 to 3
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
    pub color: [f32; 4],
}

static_assertions::assert_eq_size!(TerrainVertex, [u8; 56]);

/// Geometry of one quad, ready to hand to a render proxy.
#[derive(Clone, Debug)]
pub struct MeshData {
    /// Planet-local position of vertex 0. Every position is relative to it.
    pub offset: DVec3,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Texture weights 4 and 5.
    pub uv2: Vec<Vec2>,
    /// Texture weights 0 to 3.
    pub colors: Vec<Vec4>,
    /// Mean squared deviation of the vertex heights, 0 when not computed.
    pub msd: f32,
    /// Local-space bounds of `positions`.
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    edges: EdgeConfiguration,
    indices: &'static [u32],
}

impl MeshData {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        offset: DVec3,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        uv2: Vec<Vec2>,
        colors: Vec<Vec4>,
        msd: f32,
        edges: EdgeConfiguration,
    ) -> Self {
        let (bounds_min, bounds_max) = positions.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );
        Self {
            offset,
            positions,
            normals,
            uvs,
            uv2,
            colors,
            msd,
            bounds_min,
            bounds_max,
            edges,
            indices: index_variant(edges),
        }
    }

    #[must_use]
    pub fn edges(&self) -> EdgeConfiguration {
        self.edges
    }

    /// Triangle list for the current edge configuration.
    #[must_use]
    pub fn indices(&self) -> &'static [u32] {
        self.indices
    }

    /// Swap to the index variant for `edges`. Vertex data is unchanged.
    pub fn set_edges(&mut self, edges: EdgeConfiguration) {
        self.edges = edges;
        self.indices = index_variant(edges);
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleave the vertex streams for upload.
    #[must_use]
    pub fn interleaved(&self) -> Vec<TerrainVertex> {
        (0..self.positions.len())
            .map(|i| TerrainVertex {
                position: self.positions[i].to_array(),
                normal: self.normals[i].to_array(),
                uv: self.uvs[i].to_array(),
                uv2: self.uv2[i].to_array(),
                color: self.colors[i].to_array(),
            })
            .collect()
    }
}
