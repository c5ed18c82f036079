//! Configuration for a quadsphere planet.
//!
//! Settings persist to disk as RON files and can be overridden from the
//! command line. Every section falls back to its defaults when missing, so
//! older files keep loading as new fields appear.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, HeightMode, LodModeBehindCam, MeshConfig, PlanetConfig,
    ProjectionKind, TEXTURE_SLOTS, TerrainConfig, TextureConfig, UvMode, config_dir,
};
pub use error::ConfigError;
