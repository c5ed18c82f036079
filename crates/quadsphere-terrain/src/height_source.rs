//! The elevation function sampled by the mesh builder.

use glam::DVec3;
use quadsphere_config::{HeightMode, TerrainConfig};

use crate::heightmap::{BitDepth, Heightmap, Interpolation};
use crate::noise_graph::NoiseGraph;
use crate::TerrainError;

/// Height above the base sphere for a unit direction, nominally in `[0, 1]`.
///
/// Implementations are pure and get called from mesh worker threads.
pub trait HeightSource: Send + Sync {
    fn height(&self, dir: DVec3) -> f32;
}

/// How `TerrainHeight::Hybrid` combines its two inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HybridBlend {
    /// `heightmap + noise`.
    #[default]
    Additive,
    /// `heightmap * (noise_div - noise) / noise_div`.
    Blend,
}

/// The height sources a planet can be configured with.
#[derive(Debug, Clone)]
pub enum TerrainHeight {
    Heightmap(Heightmap),
    /// Noise graph output remapped from `[-1, 1]` to `[0, 1]`.
    Noise(NoiseGraph),
    Const(f32),
    Hybrid {
        heightmap: Heightmap,
        noise: NoiseGraph,
        noise_div: f32,
        blend: HybridBlend,
    },
}

/// The graph is sampled with X and Z mirrored so its features line up with
/// heightmap longitudes.
fn graph_at(graph: &NoiseGraph, dir: DVec3) -> f32 {
    graph.evaluate(-dir.x as f32, dir.y as f32, -dir.z as f32)
}

impl HeightSource for TerrainHeight {
    fn height(&self, dir: DVec3) -> f32 {
        match self {
            TerrainHeight::Heightmap(map) => map.sample(dir),
            TerrainHeight::Noise(graph) => (graph_at(graph, dir) + 1.0) * 0.5,
            TerrainHeight::Const(h) => *h,
            TerrainHeight::Hybrid {
                heightmap,
                noise,
                noise_div,
                blend,
            } => {
                let base = heightmap.sample(dir);
                let n = graph_at(noise, dir);
                match blend {
                    HybridBlend::Additive => base + n,
                    HybridBlend::Blend => base * (noise_div - n) / noise_div,
                }
            }
        }
    }
}

impl TerrainHeight {
    /// Build the source selected by `config.mode`, loading files from disk.
    ///
    /// Heightmap errors are returned. A missing or broken noise graph
    /// degrades to a constant zero graph.
    pub fn from_config(config: &TerrainConfig) -> Result<Self, TerrainError> {
        let noise = || match &config.noise_graph_path {
            Some(path) => NoiseGraph::load_or_zero(path),
            None => {
                tracing::warn!("No noise graph configured, using constant zero");
                NoiseGraph::zero()
            }
        };

        let source = match config.mode {
            HeightMode::Const => TerrainHeight::Const(config.constant_height),
            HeightMode::Noise => TerrainHeight::Noise(noise()),
            HeightMode::Heightmap => TerrainHeight::Heightmap(load_heightmap(config)?),
            HeightMode::Hybrid => TerrainHeight::Hybrid {
                heightmap: load_heightmap(config)?,
                noise: noise(),
                noise_div: config.hybrid_noise_div,
                blend: HybridBlend::Additive,
            },
        };
        tracing::info!("Height source ready: {:?} mode", config.mode);
        Ok(source)
    }
}

fn load_heightmap(config: &TerrainConfig) -> Result<Heightmap, TerrainError> {
    let path = config.heightmap_path.as_deref().ok_or_else(|| TerrainError::Io {
        path: Default::default(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no heightmap_path configured"),
    })?;
    let bit_depth = if config.heightmap_16bit {
        BitDepth::Sixteen
    } else {
        BitDepth::Eight
    };
    let interpolation = if config.use_bicubic {
        Interpolation::Bicubic
    } else {
        Interpolation::Bilinear
    };
    Heightmap::load(
        path,
        config.heightmap_width,
        config.heightmap_height,
        bit_depth,
        interpolation,
    )
}
