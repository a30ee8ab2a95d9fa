//! Error types for the mapping facade.

use thiserror::Error;

use corvox_geom::GeometryError;
use corvox_store::CacheError;

/// Errors surfaced by [`crate::Mapper`] construction and application.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Data passed to `apply`/`apply_inverse` matches neither the
    /// per-vertex nor the per-voxel interpretation, or an index exceeds
    /// valid bounds.
    #[error("input shape mismatch: {0}")]
    InputShape(String),

    /// The requested strategy has no implementation.
    #[error("strategy not implemented: {0}")]
    UnsupportedStrategy(String),

    /// Cache failure that was not recoverable by rebuilding.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Geometry retrieval failure.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Result type for mapper operations.
pub type Result<T> = std::result::Result<T, MapperError>;
