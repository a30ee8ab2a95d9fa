//! Reference mesh-boolean capability backed by half-space clipping.
//!
//! Clips a closed triangle mesh against the six planes of a voxel cube,
//! closing each cut with a cap fan, and measures enclosed volume by the
//! signed-tetrahedron method. Exact for elements whose plane
//! cross-sections are star-shaped, which covers voxel-scale cortical
//! columns; arbitrary geometry calls for a full CSG kernel behind the
//! same trait.

use corvox_math::{Point3, Vec3};

use crate::{GeometryError, MeshBoolean, Result, TriMesh};

const EPS: f64 = 1e-9;

/// [`MeshBoolean`] implementation using successive half-space clips.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfSpaceClip;

impl MeshBoolean for HalfSpaceClip {
    fn volume(&self, mesh: &TriMesh) -> Result<f64> {
        if mesh.is_empty() {
            return Err(GeometryError::DegenerateMesh(
                "cannot measure an empty mesh".into(),
            ));
        }
        Ok(signed_volume(mesh).abs())
    }

    fn intersect_unit_cube(&self, mesh: &TriMesh, center: Point3) -> Result<TriMesh> {
        if mesh.is_empty() {
            return Err(GeometryError::DegenerateMesh(
                "cannot intersect an empty mesh".into(),
            ));
        }

        let mut tris: Vec<[Point3; 3]> = mesh
            .faces
            .iter()
            .map(|f| {
                [
                    mesh.points[f[0] as usize],
                    mesh.points[f[1] as usize],
                    mesh.points[f[2] as usize],
                ]
            })
            .collect();

        // Keep the side n·p <= d for each of the six cube planes.
        let planes = [
            (Vec3::new(1.0, 0.0, 0.0), center.x + 0.5),
            (Vec3::new(-1.0, 0.0, 0.0), -(center.x - 0.5)),
            (Vec3::new(0.0, 1.0, 0.0), center.y + 0.5),
            (Vec3::new(0.0, -1.0, 0.0), -(center.y - 0.5)),
            (Vec3::new(0.0, 0.0, 1.0), center.z + 0.5),
            (Vec3::new(0.0, 0.0, -1.0), -(center.z - 0.5)),
        ];

        for (normal, offset) in planes {
            tris = clip_halfspace(&tris, &normal, offset);
            if tris.is_empty() {
                break;
            }
        }

        Ok(soup_to_mesh(&tris))
    }
}

/// Signed volume of a triangle soup via the divergence theorem.
fn signed_volume(mesh: &TriMesh) -> f64 {
    let mut six_vol = 0.0;
    for face in &mesh.faces {
        let a = mesh.points[face[0] as usize].coords;
        let b = mesh.points[face[1] as usize].coords;
        let c = mesh.points[face[2] as usize].coords;
        six_vol += a.dot(&b.cross(&c));
    }
    six_vol / 6.0
}

/// Clip a closed triangle soup against the half-space `n·p <= d`,
/// closing the cut with a cap fan so the result stays closed.
fn clip_halfspace(tris: &[[Point3; 3]], normal: &Vec3, offset: f64) -> Vec<[Point3; 3]> {
    let mut out: Vec<[Point3; 3]> = Vec::new();
    let mut cut_segments: Vec<(Point3, Point3)> = Vec::new();

    for tri in tris {
        let kept = clip_polygon(tri, normal, offset, &mut cut_segments);
        // fan-triangulate the clipped polygon (at most 4 vertices)
        for i in 1..kept.len().saturating_sub(1) {
            out.push([kept[0], kept[i], kept[i + 1]]);
        }
    }

    if !cut_segments.is_empty() {
        cap_cut(&mut out, &cut_segments, normal);
    }

    out
}

/// Sutherland-Hodgman clip of one triangle, recording the cut segment.
fn clip_polygon(
    tri: &[Point3; 3],
    normal: &Vec3,
    offset: f64,
    cut_segments: &mut Vec<(Point3, Point3)>,
) -> Vec<Point3> {
    let mut kept: Vec<Point3> = Vec::with_capacity(4);
    let mut crossings: Vec<Point3> = Vec::with_capacity(2);

    for i in 0..3 {
        let a = tri[i];
        let b = tri[(i + 1) % 3];
        let da = normal.dot(&a.coords) - offset;
        let db = normal.dot(&b.coords) - offset;
        let a_inside = da <= EPS;
        let b_inside = db <= EPS;

        if a_inside {
            kept.push(a);
        }
        if a_inside != b_inside {
            // edge crosses the plane strictly between its endpoints
            let t = da / (da - db);
            let p = a + t * (b - a);
            kept.push(p);
            crossings.push(p);
        }
    }

    if crossings.len() == 2 && (crossings[0] - crossings[1]).norm() > EPS {
        cut_segments.push((crossings[0], crossings[1]));
    }

    kept
}

/// Close a planar cut with a triangle fan around the cut centroid.
///
/// Each cap triangle is oriented so its normal points along the clip
/// plane normal, outward of the kept half-space.
fn cap_cut(out: &mut Vec<[Point3; 3]>, segments: &[(Point3, Point3)], normal: &Vec3) {
    let mut centroid = Vec3::zeros();
    for (a, b) in segments {
        centroid += a.coords + b.coords;
    }
    let centroid = Point3::from(centroid / (2.0 * segments.len() as f64));

    for &(a, b) in segments {
        let n = (a - centroid).cross(&(b - centroid));
        if n.norm() <= 1e-12 {
            continue;
        }
        if n.dot(normal) >= 0.0 {
            out.push([centroid, a, b]);
        } else {
            out.push([centroid, b, a]);
        }
    }
}

/// Re-index a triangle soup into a mesh, deduplicating coincident points.
fn soup_to_mesh(tris: &[[Point3; 3]]) -> TriMesh {
    let mut points: Vec<Point3> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::with_capacity(tris.len());

    let mut index_of = |points: &mut Vec<Point3>, p: Point3| -> u32 {
        for (i, q) in points.iter().enumerate() {
            if (p - q).norm() <= EPS {
                return i as u32;
            }
        }
        points.push(p);
        points.len() as u32 - 1
    };

    for tri in tris {
        let idx = [
            index_of(&mut points, tri[0]),
            index_of(&mut points, tri[1]),
            index_of(&mut points, tri[2]),
        ];
        // drop triangles collapsed by deduplication
        if idx[0] != idx[1] && idx[1] != idx[2] && idx[2] != idx[0] {
            faces.push(idx);
        }
    }

    TriMesh::new(points, faces)
}
