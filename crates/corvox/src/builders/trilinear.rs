//! Trilinear operator builder.
//!
//! Standard 8-corner interpolation: each referenced vertex distributes
//! unit weight over the corners of its enclosing voxel cell, weights
//! being products of per-axis `(1 - frac)` / `frac` factors. Corner
//! indices are clipped into the grid independently; corners merged by
//! clipping sum their weights, so row mass is preserved.

use rayon::prelude::*;

use corvox_math::{Affine, Grid, Point3};
use corvox_sparse::CsrMatrix;

/// Build one hemisphere's trilinear operator.
pub fn trilinear_hemisphere(
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
            let (fx, fy, fz) = (c.x.floor(), c.y.floor(), c.z.floor());
            let (tx, ty, tz) = (c.x - fx, c.y - fy, c.z - fz);
            let (ix, iy, iz) = (fx as i64, fy as i64, fz as i64);

            let mut taps = Vec::with_capacity(8);
            for dz in 0..2i64 {
                let wz = if dz == 0 { 1.0 - tz } else { tz };
                for dy in 0..2i64 {
                    let wy = if dy == 0 { 1.0 - ty } else { ty };
                    for dx in 0..2i64 {
                        let wx = if dx == 0 { 1.0 - tx } else { tx };
                        taps.push((grid.clip_index(iz + dz, iy + dy, ix + dx), wx * wy * wz));
                    }
                }
            }
            taps
        })
        .collect();

    CsrMatrix::from_rows(grid.len(), rows)
}
