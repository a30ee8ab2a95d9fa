//! Operator builders, one per mapping strategy.
//!
//! Each builder computes one hemisphere's sparse weight matrix from
//! surface geometry, the voxel transform, and the grid shape. Per-vertex
//! work shares no state, so builders fan out over a rayon pool and merge
//! rows into one compressed-row matrix at the end.

mod lanczos;
mod nearest;
mod polyhedral;
mod trilinear;

pub use lanczos::lanczos_hemisphere;
pub use nearest::nearest_hemisphere;
pub use polyhedral::{polyhedral_hemisphere, Progress};
pub use trilinear::trilinear_hemisphere;

use corvox_geom::{GeometrySource, HemiPair, MeshBoolean, SurfaceKind, TransformInfo};
use corvox_sparse::CsrMatrix;

use crate::error::{MapperError, Result};
use crate::Strategy;

/// Build both hemisphere operators for one strategy.
pub(crate) fn build_pair(
    source: &dyn GeometrySource,
    csg: &dyn MeshBoolean,
    subject: &str,
    strategy: &Strategy,
    info: &TransformInfo,
) -> Result<HemiPair<CsrMatrix>> {
    let affine = &info.affine;
    let grid = &info.grid;

    match strategy {
        Strategy::Nearest => {
            let fid = source.surface(subject, SurfaceKind::Fiducial)?;
            let referenced = source.referenced(subject)?;
            Ok(HemiPair::new(
                nearest_hemisphere(&fid.left.points, &referenced.left, affine, grid),
                nearest_hemisphere(&fid.right.points, &referenced.right, affine, grid),
            ))
        }
        Strategy::Trilinear => {
            let fid = source.surface(subject, SurfaceKind::Fiducial)?;
            let referenced = source.referenced(subject)?;
            Ok(HemiPair::new(
                trilinear_hemisphere(&fid.left.points, &referenced.left, affine, grid),
                trilinear_hemisphere(&fid.right.points, &referenced.right, affine, grid),
            ))
        }
        Strategy::Lanczos { window, renorm } => {
            // every vertex gets a row; the flat triangulation is not consulted
            let fid = source.surface(subject, SurfaceKind::Fiducial)?;
            Ok(HemiPair::new(
                lanczos_hemisphere(&fid.left.points, affine, grid, *window, *renorm),
                lanczos_hemisphere(&fid.right.points, affine, grid, *window, *renorm),
            ))
        }
        Strategy::Polyhedral => {
            let pial = source.surface(subject, SurfaceKind::Pial)?;
            let wm = source.surface(subject, SurfaceKind::WhiteMatter)?;
            Ok(HemiPair::new(
                polyhedral_hemisphere(&pial.left, &wm.left, affine, grid, csg, None),
                polyhedral_hemisphere(&pial.right, &wm.right, affine, grid, csg, None),
            ))
        }
        Strategy::Gaussian { .. } | Strategy::GaussianThickness { .. } => Err(
            MapperError::UnsupportedStrategy(strategy.tag().to_string()),
        ),
    }
}
