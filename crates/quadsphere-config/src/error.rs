//! Errors raised while handling `planet.ron`.

/// Loading, saving or validating a planet configuration failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `planet.ron` exists but could not be read.
    #[error("cannot read planet config: {0}")]
    ReadError(#[source] std::io::Error),

    /// The config directory or file could not be written.
    #[error("cannot write planet config: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("malformed planet config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    #[error("cannot encode planet config: {0}")]
    SerializeError(#[source] ron::Error),

    /// Parsed fine but describes a planet the LOD manager cannot run.
    #[error("invalid planet config: {0}")]
    Invalid(String),
}
