/// Errors raised while building a quad mesh.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshBuildError {
    /// The height source produced a NaN or infinite value.
    #[error("non-finite height or position at vertex {index}")]
    NonFinite { index: usize },
}
