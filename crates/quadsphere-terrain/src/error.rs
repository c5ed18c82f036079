//! Errors raised while building height sources.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// A heightmap, biome map or noise graph file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The raw heightmap byte count does not match the declared resolution.
    #[error(
        "heightmap resolution mismatch: {width}x{height} at {bit_depth} bits needs {expected} bytes, got {actual}"
    )]
    ResolutionMismatch {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
        bit_depth: u8,
    },

    /// An image file could not be decoded.
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse noise graph: {0}")]
    NoiseParse(#[source] ron::error::SpannedError),

    #[error("failed to serialize noise graph: {0}")]
    NoiseSerialize(#[source] ron::Error),
}
