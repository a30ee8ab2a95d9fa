//! Exact volume-overlap operator builder.
//!
//! For each vertex, the cortical-column element between the pial and
//! white-matter surfaces is intersected with every voxel cube in its
//! integer bounding box; the weight on a voxel is the intersected
//! fraction of the total column volume. Orders of magnitude slower than
//! the kernel builders, so rows report progress as they complete.
//!
//! Both mesh capabilities (closed-mesh volume, mesh/cube intersection)
//! come from the [`MeshBoolean`] collaborator. A capability failure on a
//! single degenerate column zeroes that row and continues; it never
//! aborts the hemisphere.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use corvox_geom::{column_polyhedron, Incidence, MeshBoolean, TriMesh};
use corvox_math::{Affine, Grid, Point3};
use corvox_sparse::CsrMatrix;

/// Per-row progress callback: (rows completed, rows total).
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Intersection volumes at or below this threshold are omitted.
const MIN_OVERLAP: f64 = 1e-6;

/// Build one hemisphere's volume-overlap operator.
///
/// `pial` and `wm` share vertex order and topology; the pial face list
/// defines the incident patches. Points are mapped into voxel space
/// before any geometry is measured.
pub fn polyhedral_hemisphere(
    pial: &TriMesh,
    wm: &TriMesh,
    affine: &Affine,
    grid: &Grid,
    csg: &dyn MeshBoolean,
    progress: Option<Progress<'_>>,
) -> CsrMatrix {
    let nverts = pial.num_points();
    let faces = &pial.faces;
    let incidence = Incidence::new(nverts, faces);
    let pial_pts = affine.apply_all(&pial.points);
    let wm_pts = affine.apply_all(&wm.points);

    let done = AtomicUsize::new(0);
    let rows: Vec<Vec<(usize, f64)>> = (0..nverts)
        .into_par_iter()
        .map(|v| {
            let taps = column_weights(v, &incidence, faces, &pial_pts, &wm_pts, grid, csg);
            let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
            if completed % 100 == 0 {
                debug!(rows = completed, total = nverts, "polyhedral rows built");
            }
            if let Some(report) = progress {
                report(completed, nverts);
            }
            taps
        })
        .collect();

    CsrMatrix::from_rows(grid.len(), rows)
}

/// Overlap weights for one vertex's column element.
fn column_weights(
    vertex: usize,
    incidence: &Incidence,
    faces: &[[u32; 3]],
    pial: &[Point3],
    wm: &[Point3],
    grid: &Grid,
    csg: &dyn MeshBoolean,
) -> Vec<(usize, f64)> {
    let Some(column) = column_polyhedron(vertex, incidence, faces, pial, wm) else {
        return Vec::new();
    };

    let total = match csg.volume(&column) {
        Ok(vol) if vol > MIN_OVERLAP => vol,
        Ok(_) => return Vec::new(),
        Err(e) => {
            warn!(vertex, error = %e, "column volume failed, zeroing row");
            return Vec::new();
        }
    };

    // integer bounding box of voxel centers whose cubes can overlap
    let (min, max) = column.aabb().expect("column has points");
    let lo = |v: f64| v.round() as i64 - 1;
    let hi = |v: f64| v.round() as i64 + 1;

    let mut taps = Vec::new();
    for z in lo(min.z)..=hi(max.z) {
        for y in lo(min.y)..=hi(max.y) {
            for x in lo(min.x)..=hi(max.x) {
                if !grid.contains(z, y, x) {
                    continue;
                }
                let center = Point3::new(x as f64, y as f64, z as f64);
                let overlap = csg.intersect_unit_cube(&column, center).and_then(|m| {
                    if m.is_empty() {
                        Ok(0.0)
                    } else {
                        csg.volume(&m)
                    }
                });
                match overlap {
                    Ok(vol) if vol > MIN_OVERLAP => {
                        taps.push((
                            grid.index(z as usize, y as usize, x as usize),
                            vol / total,
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(vertex, error = %e, "voxel intersection failed, zeroing row");
                        return Vec::new();
                    }
                }
            }
        }
    }
    taps
}
