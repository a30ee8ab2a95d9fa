//! Nearest-neighbor operator builder.

use rayon::prelude::*;

use corvox_math::{Affine, Grid, Point3};
use corvox_sparse::CsrMatrix;

/// Build one hemisphere's nearest-neighbor operator.
///
/// Each flat-referenced vertex maps to the single voxel its fiducial
/// position rounds to. Vertices outside the grid on any axis, or absent
/// from the flat triangulation, get an all-zero row.
pub fn nearest_hemisphere(
    points: &[Point3],
    referenced: &[bool],
    affine: &Affine,
    grid: &Grid,
) -> CsrMatrix {
    let rows: Vec<Vec<(usize, f64)>> = points
        .par_iter()
        .enumerate()
        .map(|(v, p)| {
            if !referenced[v] {
                return Vec::new();
            }
            let c = affine.apply(p);
            let (x, y, z) = (
                c.x.round() as i64,
                c.y.round() as i64,
                c.z.round() as i64,
            );
            if grid.contains(z, y, x) {
                vec![(grid.index(z as usize, y as usize, x as usize), 1.0)]
            } else {
                Vec::new()
            }
        })
        .collect();

    CsrMatrix::from_rows(grid.len(), rows)
}
