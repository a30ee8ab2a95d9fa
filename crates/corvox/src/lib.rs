//! corvox: sparse mapping operators between functional volumes and
//! cortical surfaces.
//!
//! A [`Mapper`] owns one sparse (vertices × voxels) operator per
//! hemisphere, built by one of four interchangeable strategies:
//!
//! 1. **Nearest**: each vertex takes the voxel its position rounds to
//! 2. **Trilinear**: 8-corner interpolation around the vertex
//! 3. **Lanczos**: separable windowed-sinc kernel over a support window
//! 4. **Polyhedral**: exact volume overlap of the cortical-column
//!    element with each voxel cube
//!
//! Operators are cached on disk per (subject, transform, strategy +
//! parameters) and rebuilt when missing, stale, or explicitly recached.
//! `apply` maps volume data forward onto vertices; `apply_inverse`
//! projects vertex data back into the volume.

mod builders;
mod error;
mod mapper;
mod series;

pub use builders::{
    lanczos_hemisphere, nearest_hemisphere, polyhedral_hemisphere, trilinear_hemisphere, Progress,
};
pub use error::{MapperError, Result};
pub use mapper::Mapper;
pub use series::{Series, VertexInput, Volume};

pub use corvox_geom::{
    column_polyhedron, referenced_mask, GeometryError, GeometrySource, HalfSpaceClip, Hemi,
    HemiPair, Incidence, MeshBoolean, SurfaceKind, TransformInfo, TriMesh,
};
pub use corvox_math::{Affine, Grid, Point3, Vec3};
pub use corvox_sparse::CsrMatrix;
pub use corvox_store::{CacheError, CacheKey, OperatorStore, StoreConfig};

/// Operator-construction strategy, selected by name with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Nearest-neighbor: one unit entry per referenced vertex.
    Nearest,
    /// Trilinear interpolation over the 8 surrounding voxel corners.
    Trilinear,
    /// Windowed-sinc kernel with the given support radius; `renorm`
    /// rescales each row to unit sum.
    Lanczos {
        /// Support radius in voxels.
        window: u32,
        /// Renormalize each vertex row to sum to one.
        renorm: bool,
    },
    /// Exact cortical-column / voxel volume overlap.
    Polyhedral,
    /// Gaussian kernel (not implemented).
    Gaussian {
        /// Kernel standard deviation in voxels.
        std: f64,
    },
    /// Thickness-scaled Gaussian kernel (not implemented).
    GaussianThickness {
        /// Kernel standard deviation in voxels.
        std: f64,
    },
}

impl Strategy {
    /// Lanczos with the default window of 3 and renormalization on.
    pub fn lanczos() -> Self {
        Strategy::Lanczos {
            window: 3,
            renorm: true,
        }
    }

    /// Lowercase tag used in cache keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Strategy::Nearest => "nearest",
            Strategy::Trilinear => "trilinear",
            Strategy::Lanczos { .. } => "lanczos",
            Strategy::Polyhedral => "polyhedral",
            Strategy::Gaussian { .. } => "gaussian",
            Strategy::GaussianThickness { .. } => "gaussianthickness",
        }
    }

    /// Whether a builder exists for this strategy.
    pub fn is_supported(&self) -> bool {
        !matches!(
            self,
            Strategy::Gaussian { .. } | Strategy::GaussianThickness { .. }
        )
    }

    pub(crate) fn display_name(&self) -> &'static str {
        match self {
            Strategy::Nearest => "Nearest",
            Strategy::Trilinear => "Trilinear",
            Strategy::Lanczos { .. } => "Lanczos",
            Strategy::Polyhedral => "Polyhedral",
            Strategy::Gaussian { .. } => "Gaussian",
            Strategy::GaussianThickness { .. } => "GaussianThickness",
        }
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        match self {
            Strategy::Lanczos { window, renorm } => vec![
                ("window".into(), window.to_string()),
                ("renorm".into(), renorm.to_string()),
            ],
            Strategy::Gaussian { std } | Strategy::GaussianThickness { std } => {
                vec![("std".into(), std.to_string())]
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn cache_key(&self, subject: &str, transform: &str) -> CacheKey {
        CacheKey::new(subject, transform, self.tag(), self.params())
    }
}
