//! Elevation sources for quadsphere planets: raw heightmaps, noise operator
//! graphs, constants and a heightmap/noise hybrid. Also hosts the
//! height-banded texture weighting applied per vertex.

mod curve;
mod error;
mod height_source;
mod heightmap;
mod noise_graph;
mod texture;

pub use curve::{FloatCurve, cubic_interpolation};
pub use error::TerrainError;
pub use height_source::{HeightSource, HybridBlend, TerrainHeight};
pub use heightmap::{BitDepth, Heightmap, Interpolation};
pub use noise_graph::{FractalKind, FractalParams, NoiseGraph, NoiseNode};
pub use texture::{TextureWeights, evaluate_texture, slope_override};
