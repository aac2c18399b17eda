//! Error types for graph operations.

use thiserror::Error;

/// Largest number of simultaneous vertices a graph accepts.
pub const MAX_VERTICES: usize = 1 << 30;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    #[error("Self-loop edges are not supported")]
    SelfLoop,

    #[error("Graph is at its maximum of {MAX_VERTICES} vertices")]
    TooManyVertices,

    #[error("Vertex augmentation is not enabled for this graph")]
    AugmentationDisabled,

    #[error("The component registry is not enabled for this graph")]
    RegistryDisabled,
}

pub type Result<T> = std::result::Result<T, GraphError>;
