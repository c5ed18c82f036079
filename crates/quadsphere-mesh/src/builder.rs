//! Turns a cube patch into a displaced, textured terrain mesh.

use std::sync::Arc;

use glam::{DVec3, Vec2, Vec3, Vec4};
use quadsphere_config::{Config, ProjectionKind, UvMode};
use quadsphere_cubesphere::{ProjectionMethod, QuadPatch, QuadPath, QuadPlane, project};
use quadsphere_terrain::{
    HeightSource, Heightmap, Interpolation, TerrainError, evaluate_texture, slope_override,
};

use crate::MeshBuildError;
use crate::edge_fan::EdgeConfiguration;
use crate::mesh_data::MeshData;
use crate::template::{GRID_SIZE, GRID_VERTICES, plane_template};

/// What a build needs to know about one quad.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadGeometry {
    pub path: QuadPath,
    pub patch: QuadPatch,
    pub edges: EdgeConfiguration,
}

impl QuadGeometry {
    #[must_use]
    pub fn new(path: QuadPath, edges: EdgeConfiguration) -> Self {
        let patch = QuadPatch::from_path(&path);
        Self { path, patch, edges }
    }
}

#[derive(Clone, Copy, Debug)]
struct SlopeTexture {
    max_angle: f32,
    texture: u8,
}

/// Planet-wide meshing parameters plus the height source. Shared by all
/// mesh workers.
pub struct MeshBuilder {
    source: Arc<dyn HeightSource>,
    radius: f64,
    height_inv: f64,
    projection: ProjectionMethod,
    uv_mode: UvMode,
    uv_scale: f64,
    detail_levels: usize,
    texture_heights: Vec<f32>,
    texture_ids: Vec<u8>,
    slope: Option<SlopeTexture>,
    biome_map: Option<Heightmap>,
    calculate_msd: bool,
}

impl std::fmt::Debug for MeshBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshBuilder")
            .field("radius", &self.radius)
            .field("height_inv", &self.height_inv)
            .field("projection", &self.projection)
            .field("uv_mode", &self.uv_mode)
            .field("biome_map", &self.biome_map.is_some())
            .finish_non_exhaustive()
    }
}

fn projection_method(kind: ProjectionKind) -> ProjectionMethod {
    match kind {
        ProjectionKind::Normalize => ProjectionMethod::Normalize,
        ProjectionKind::Everitt => ProjectionMethod::Everitt,
        ProjectionKind::TangentWarp => ProjectionMethod::TangentWarp,
    }
}

impl MeshBuilder {
    /// Build from the planet config. Loads the biome map when enabled.
    pub fn new(config: &Config, source: Arc<dyn HeightSource>) -> Result<Self, TerrainError> {
        let tex = &config.texturing;
        let biome_map = match (&tex.biome_map_path, tex.use_biome_map) {
            (Some(path), true) => Some(Heightmap::from_image(path, Interpolation::Bilinear)?),
            _ => None,
        };
        Ok(Self {
            source,
            radius: f64::from(config.planet.radius),
            height_inv: 1.0 / f64::from(config.terrain.height_scale),
            projection: projection_method(config.planet.projection),
            uv_mode: config.planet.uv_type,
            uv_scale: f64::from(config.planet.uv_scale),
            detail_levels: config.planet.detail_distances.len(),
            texture_heights: tex.texture_heights.clone(),
            texture_ids: tex.texture_ids.clone(),
            slope: tex.use_slope_texture.then(|| SlopeTexture {
                max_angle: tex.slope_angle.to_radians(),
                texture: tex.slope_texture,
            }),
            biome_map,
            calculate_msd: config.planet.calculate_msds,
        })
    }

    /// Texture by biome map samples instead of height.
    #[must_use]
    pub fn with_biome_map(mut self, map: Heightmap) -> Self {
        self.biome_map = Some(map);
        self
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Radius of the highest possible terrain point (height 1).
    #[must_use]
    pub fn max_radius(&self) -> f64 {
        self.radius * (self.height_inv + 1.0) / self.height_inv
    }

    /// Displace the template over `geometry.patch`.
    pub fn build(&self, geometry: &QuadGeometry) -> Result<MeshData, MeshBuildError> {
        let template = plane_template();
        let patch = &geometry.patch;
        let (right, up) = (patch.right(), patch.up());

        let mut world = Vec::with_capacity(template.coords.len());
        let mut heights = Vec::with_capacity(GRID_VERTICES);
        let mut dirs = Vec::with_capacity(GRID_VERTICES);
        let mut planar = Vec::with_capacity(GRID_VERTICES);

        for (index, [u, v]) in template.coords.iter().enumerate() {
            let local = (right * *u + up * *v) * patch.scale;
            let dir = project(patch.center + local, self.projection);
            let h = self.source.height(dir);
            let pos = dir * self.radius * (self.height_inv + f64::from(h)) / self.height_inv;
            if !h.is_finite() || !pos.is_finite() {
                return Err(MeshBuildError::NonFinite { index });
            }
            world.push(pos);
            if index < GRID_VERTICES {
                heights.push(h);
                dirs.push(dir);
                planar.push(local);
            }
        }

        let offset = world[0];
        let local: Vec<Vec3> = world.iter().map(|p| (*p - offset).as_vec3()).collect();

        let mut normals = vec![Vec3::ZERO; local.len()];
        for tri in template.extended_triangles.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let n = (local[b] - local[a]).cross(local[c] - local[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        normals.truncate(GRID_VERTICES);
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }

        let up_dir = offset.normalize_or_zero().as_vec3();
        let mut colors = Vec::with_capacity(GRID_VERTICES);
        let mut uv2 = Vec::with_capacity(GRID_VERTICES);
        for i in 0..GRID_VERTICES {
            let band = match &self.biome_map {
                Some(map) => map.sample(dirs[i]),
                None => heights[i],
            };
            let mut weights = evaluate_texture(band, &self.texture_heights, &self.texture_ids);
            if let Some(slope) = self.slope {
                let angle = up_dir.dot(normals[i]).clamp(-1.0, 1.0).acos();
                weights = slope_override(weights, slope.texture, angle > slope.max_angle);
            }
            colors.push(Vec4::new(weights[0], weights[1], weights[2], weights[3]));
            uv2.push(Vec2::new(weights[4], weights[5]));
        }

        let uvs = self.uvs(geometry, &planar);

        let msd = if self.calculate_msd {
            mean_squared_deviation(&heights)
        } else {
            0.0
        };

        let mut positions = local;
        positions.truncate(GRID_VERTICES);
        Ok(MeshData::new(
            offset,
            positions,
            normals,
            uvs,
            uv2,
            colors,
            msd,
            geometry.edges,
        ))
    }

    fn uvs(&self, geometry: &QuadGeometry, planar: &[DVec3]) -> Vec<Vec2> {
        let level = i32::from(geometry.path.level());
        let grid_uv = |i: usize| {
            let (col, row) = (i / GRID_SIZE, i % GRID_SIZE);
            let last = (GRID_SIZE - 1) as f64;
            (col as f64 / last, row as f64 / last)
        };

        match self.uv_mode {
            UvMode::Legacy | UvMode::LegacyContinuous => {
                let center = if self.uv_mode == UvMode::LegacyContinuous {
                    geometry.patch.center
                } else {
                    DVec3::ZERO
                };
                let plane = geometry.patch.root.plane();
                planar
                    .iter()
                    .map(|p| {
                        let p = *p + center;
                        let (x, y) = match plane {
                            QuadPlane::Z => (p.x, p.y),
                            QuadPlane::Y => (p.x, p.z),
                            QuadPlane::X => (p.z, p.y),
                        };
                        Vec2::new(x as f32, y as f32)
                    })
                    .collect()
            }
            UvMode::Cube => {
                let (mut off_x, mut off_y) = (0.0, 0.0);
                let mut p = 0.5 * self.uv_scale;
                for digit in geometry.path.digits() {
                    if digit & 1 == 1 {
                        off_x += p;
                    }
                    if digit & 2 == 2 {
                        off_y += p;
                    }
                    p *= 0.5;
                }
                let scale = self.uv_scale / 2f64.powi(level);
                (0..GRID_VERTICES)
                    .map(|i| {
                        let (x, y) = grid_uv(i);
                        let x = x * scale + off_x % 1.0;
                        let y = -(y * scale + off_y % 1.0);
                        Vec2::new(x as f32, y as f32)
                    })
                    .collect()
            }
            UvMode::Quad => {
                let tiling = 2f64.powi(self.detail_levels as i32 - level);
                (0..GRID_VERTICES)
                    .map(|i| {
                        let (x, y) = grid_uv(i);
                        Vec2::new((x * tiling) as f32, (-y * tiling) as f32)
                    })
                    .collect()
            }
        }
    }
}

fn mean_squared_deviation(heights: &[f32]) -> f32 {
    if heights.is_empty() {
        return 0.0;
    }
    let n = heights.len() as f32;
    let mean = heights.iter().sum::<f32>() / n;
    heights.iter().map(|h| (mean - h) * (mean - h)).sum::<f32>() / n
}
