use quadsphere_config::ConfigError;
use quadsphere_terrain::TerrainError;

/// Failures while setting up a planet.
#[derive(Debug, thiserror::Error)]
pub enum LodError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to prepare height source: {0}")]
    Terrain(#[from] TerrainError),
}
